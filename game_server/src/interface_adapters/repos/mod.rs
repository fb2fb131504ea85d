pub mod amqp;
pub mod guest_token;
pub mod postgres;
pub mod redis;
pub mod word_generator;
