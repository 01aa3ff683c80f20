use std::collections::BTreeSet;

use super::catalog::Product;

/// Sorted union of every characteristic name seen in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    keys: Vec<String>,
}

impl Schema {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub fn aggregate_keys(products: &[Product]) -> Schema {
    let keys = products
        .iter()
        .flat_map(|product| product.characteristics.keys())
        .cloned()
        .collect::<BTreeSet<_>>();
    Schema {
        keys: keys.into_iter().collect(),
    }
}
