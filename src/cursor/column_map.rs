use std::collections::HashMap;

use crate::statement::raw::RawStatement;

/// Column name to index lookup for one prepared statement.
///
/// When several result columns share a name, the left-most one wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indexes: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn build(stmt: &RawStatement) -> Self {
        Self::from_names((0..stmt.column_count()).map(|i| stmt.column_name(i)))
    }

    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut indexes = HashMap::new();
        for (i, name) in names.into_iter().enumerate() {
            if let Some(name) = name {
                indexes.entry(name.to_string()).or_insert(i);
            }
        }
        Self { indexes }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.indexes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
