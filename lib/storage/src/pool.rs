//! Item pool snapshots: one JSON-encoded [`Item`] per line.

use fairrank_core::{EmbeddingStore, Error, Item, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub fn load_items<P: AsRef<Path>>(path: P) -> Result<Vec<Item>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut items = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item: Item = serde_json::from_str(&line)
            .map_err(|e| Error::Serialization(format!("{}:{}: {e}", path.display(), n + 1)))?;
        items.push(item);
    }
    Ok(items)
}

/// Load the pool and build the embedding matrix.
pub fn load_pool<P: AsRef<Path>>(path: P) -> Result<EmbeddingStore> {
    let items = load_items(&path)?;
    let store = EmbeddingStore::from_items(items)?;
    info!(
        path = %path.as_ref().display(),
        items = store.len(),
        dim = store.dim(),
        "item pool loaded"
    );
    Ok(store)
}

pub fn write_pool<P: AsRef<Path>>(path: P, items: &[Item]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairrank_core::{ItemId, Vector};
    use tempfile::tempdir;

    #[test]
    fn test_load_written_pool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.jsonl");
        let items = vec![
            Item::new("j1", Vector::new(vec![1.0, 0.0])).with_attribute("company_bucket", "small"),
            Item::new("j2", Vector::new(vec![0.0, 1.0])),
        ];
        write_pool(&path, &items).unwrap();

        let store = load_pool(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.dim(), 2);
        assert_eq!(
            store.item(&ItemId::from("j1")).and_then(|i| i.attribute("company_bucket")),
            Some("small")
        );
    }

    #[test]
    fn test_attributes_optional_and_blank_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.jsonl");
        std::fs::write(&path, "{\"id\":\"a\",\"vector\":[1.0,2.0]}\n\n{\"id\":\"b\",\"vector\":[0.5,0.5]}\n")
            .unwrap();
        let items = load_items(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].attributes.is_empty());
    }

    #[test]
    fn test_bad_line_reports_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.jsonl");
        std::fs::write(&path, "{\"id\":\"a\",\"vector\":[1.0]}\n{oops}\n").unwrap();
        match load_items(&path) {
            Err(Error::Serialization(msg)) => assert!(msg.contains(":2:")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_pool_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.jsonl");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(load_pool(&path), Err(Error::EmptyPool)));
    }
}
