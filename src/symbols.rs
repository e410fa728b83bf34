//! Symbol table: id → text lookup for decoded candidates.

use crate::error::{Result, RillError};
use std::fs;
use std::path::Path;

/// Maps vocabulary ids to their text form.
///
/// The table size must match the inference engine's output dimension; the
/// decoding session checks this at construction.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<String>,
}

impl SymbolTable {
    /// Builds a table from symbols already ordered by id.
    pub fn from_symbols(symbols: Vec<String>) -> Self {
        Self { symbols }
    }

    /// Loads a table from a `words.txt`-style file: one `<symbol> <id>`
    /// pair per line, ids dense from 0.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self> {
        let mut entries: Vec<(String, usize)> = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (symbol, id) = match (parts.next(), parts.next(), parts.next()) {
                (Some(symbol), Some(id), None) => (symbol, id),
                _ => {
                    return Err(RillError::SymbolTable {
                        message: format!("line {}: expected '<symbol> <id>'", line_no + 1),
                    });
                }
            };
            let id: usize = id.parse().map_err(|_| RillError::SymbolTable {
                message: format!("line {}: invalid id '{}'", line_no + 1, id),
            })?;
            entries.push((symbol.to_string(), id));
        }

        let mut symbols = vec![None; entries.len()];
        for (symbol, id) in entries {
            if id >= symbols.len() {
                return Err(RillError::SymbolTable {
                    message: format!("id {} out of range for {} entries", id, symbols.len()),
                });
            }
            if symbols[id].is_some() {
                return Err(RillError::SymbolTable {
                    message: format!("duplicate id {}", id),
                });
            }
            symbols[id] = Some(symbol);
        }

        // Density was established above: every slot is filled once.
        let symbols = symbols.into_iter().flatten().collect();
        Ok(Self { symbols })
    }

    /// Vocabulary size.
    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// The text form of one symbol id.
    pub fn text(&self, id: u32) -> Option<&str> {
        self.symbols.get(id as usize).map(String::as_str)
    }

    /// Decodes a candidate sequence by concatenating its symbols.
    pub fn decode(&self, sequence: &[u32]) -> Result<String> {
        let mut out = String::new();
        for &id in sequence {
            let symbol = self.text(id).ok_or(RillError::UnknownSymbol {
                id,
                size: self.size(),
            })?;
            out.push_str(symbol);
        }
        Ok(out)
    }
}
