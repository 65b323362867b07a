//! [`EntityCatalog`] implementations.

use std::path::{Path, PathBuf};

use crate::source::{BoxFuture, CatalogError, EntityCatalog};
use crate::EntityId;

/// Fixed in-memory entity list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCatalog {
    entities: Vec<EntityId>,
}

impl StaticCatalog {
    pub fn new(entities: Vec<EntityId>) -> Self {
        Self { entities }
    }

    /// Parses raw identifiers, reporting the 1-based position of the first invalid one.
    pub fn parse<I, S>(raw: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entities = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                EntityId::parse(value.as_ref()).map_err(|source| CatalogError::InvalidEntity {
                    line: index + 1,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entities })
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }
}

impl EntityCatalog for StaticCatalog {
    fn list_entities_to_ingest(&self) -> BoxFuture<'_, Result<Vec<EntityId>, CatalogError>> {
        let entities = self.entities.clone();
        Box::pin(async move { Ok(entities) })
    }
}

/// Newline-separated entity file. Blank lines and `#` comments are ignored,
/// including trailing comments after an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntityCatalog for FileCatalog {
    fn list_entities_to_ingest(&self) -> BoxFuture<'_, Result<Vec<EntityId>, CatalogError>> {
        Box::pin(async move {
            let contents =
                tokio::fs::read_to_string(&self.path)
                    .await
                    .map_err(|source| CatalogError::Io {
                        path: self.path.clone(),
                        source,
                    })?;
            parse_entity_lines(&contents)
        })
    }
}

pub fn parse_entity_lines(contents: &str) -> Result<Vec<EntityId>, CatalogError> {
    let mut entities = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let entity = EntityId::parse(content).map_err(|source| CatalogError::InvalidEntity {
            line: index + 1,
            source,
        })?;
        entities.push(entity);
    }
    Ok(entities)
}
