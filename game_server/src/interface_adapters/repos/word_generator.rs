//! Loads `game.word_file` once at startup; `generate` reshuffles the
//! in-memory list per call and joins the first `word_count` entries.

use rand::seq::SliceRandom;
use std::sync::Mutex;

use crate::domain::ports::WordGenerator;

pub struct FileWordGenerator {
    words: Vec<String>,
    rng: Mutex<rand::rngs::StdRng>,
}

impl FileWordGenerator {
    pub fn load(path: &str) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let words: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self {
            words,
            rng: Mutex::new(rand::SeedableRng::from_entropy()),
        })
    }
}

impl WordGenerator for FileWordGenerator {
    fn generate(&self, word_count: usize) -> String {
        let mut shuffled = self.words.clone();
        let mut rng = self.rng.lock().unwrap();
        shuffled.shuffle(&mut *rng);
        shuffled
            .into_iter()
            .take(word_count)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
