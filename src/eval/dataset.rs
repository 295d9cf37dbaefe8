//! Question/answer datasets for evaluation runs.
//!
//! Datasets are JSON files of the form:
//!
//! ```json
//! {
//!   "name": "my_dataset",
//!   "items": [
//!     {
//!       "id": "1",
//!       "document": "Document text...",
//!       "question": "What is X?",
//!       "expected_answer": "X is Y"
//!     }
//!   ]
//! }
//! ```

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single evaluation item with a document and question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    /// Unique identifier for this item.
    pub id: String,
    /// The document text retrieval runs over.
    pub document: String,
    /// The question to answer.
    pub question: String,
    /// Ground truth answer.
    #[serde(alias = "answer")]
    pub expected_answer: String,
}

/// A collection of evaluation items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name.
    pub name: String,
    /// Dataset items.
    pub items: Vec<DatasetItem>,
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
        }
    }

    /// Add an item to the dataset.
    pub fn add_item(&mut self, item: DatasetItem) {
        self.items.push(item);
    }

    /// Number of items in the dataset.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a subset of items (for quick testing).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            items: self.items.iter().take(n).cloned().collect(),
        }
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            RagError::Serialization(format!("Failed to parse dataset {:?}: {}", path, e))
        })
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Serialization(e.to_string()))?;
        fs::write(path, content).map_err(|e| RagError::io(path, e))
    }
}

fn item(id: &str, document: &str, question: &str, expected_answer: &str) -> DatasetItem {
    DatasetItem {
        id: id.to_string(),
        document: document.to_string(),
        question: question.to_string(),
        expected_answer: expected_answer.to_string(),
    }
}

/// Small built-in dataset for smoke runs.
pub fn sample_dataset() -> Dataset {
    let mut dataset = Dataset::new("sample");

    dataset.add_item(item(
        "sample_1",
        r#"
Rust is a systems programming language focused on safety, speed, and concurrency.
It achieves memory safety without garbage collection through its ownership system.
The borrow checker ensures references are valid and prevents data races at compile time.
Rust was originally designed by Graydon Hoare at Mozilla Research.
The first stable release, Rust 1.0, was announced in May 2015.
"#,
        "What mechanism does Rust use to achieve memory safety?",
        "Rust uses an ownership system and borrow checker to achieve memory safety without garbage collection.",
    ));

    dataset.add_item(item(
        "sample_2",
        r#"
Python is a high-level, interpreted programming language known for its clear syntax.
Created by Guido van Rossum, Python was first released in 1991.
Python supports multiple programming paradigms including procedural, object-oriented, and functional programming.
The Python Package Index (PyPI) hosts thousands of third-party packages.
Python is widely used in data science, machine learning, and web development.
"#,
        "Who created Python and when was it first released?",
        "Python was created by Guido van Rossum and first released in 1991.",
    ));

    dataset.add_item(item(
        "sample_3",
        r#"
Machine learning is a subset of artificial intelligence that enables systems to learn from data.
Supervised learning uses labeled data to train models, while unsupervised learning finds patterns in unlabeled data.
Neural networks are computing systems inspired by biological neural networks in animal brains.
Deep learning uses neural networks with many layers to model complex patterns.
Common applications include image recognition, natural language processing, and recommendation systems.
"#,
        "What is the difference between supervised and unsupervised learning?",
        "Supervised learning uses labeled data to train models, while unsupervised learning finds patterns in unlabeled data.",
    ));

    dataset.add_item(item(
        "sample_4",
        r#"
Rust is a systems programming language focused on safety, speed, and concurrency.
It achieves memory safety without garbage collection through its ownership system.
The borrow checker ensures references are valid and prevents data races at compile time.
Rust was originally designed by Graydon Hoare at Mozilla Research.
The first stable release, Rust 1.0, was announced in May 2015.
"#,
        "When was Rust 1.0 released?",
        "Rust 1.0 was announced in May 2015.",
    ));

    dataset
}
