//! Chunk Partitioner: groups modules into output chunks.
//!
//! Each module record names the origin chunk that first reached it (an
//! entry, or an async chunk started by a dynamic import). Dependency modules
//! are pulled out of their origin into the highest-priority cache group
//! whose test matches; everything else stays with its origin.

use crate::error::Error;
use crate::project::schema::{CacheGroupConfig, OptimizationConfig};
use crate::rules::Condition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Which origin chunks a cache group may extract modules from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSelector {
    #[default]
    All,
    Initial,
    Async,
}

impl ChunkSelector {
    #[must_use]
    pub fn allows(&self, origin: OriginKind) -> bool {
        match self {
            Self::All => true,
            Self::Initial => origin == OriginKind::Initial,
            Self::Async => origin == OriginKind::Async,
        }
    }
}

/// How an origin chunk is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    /// Loaded by the HTML document (an entry).
    Initial,
    /// Loaded on demand by a dynamic import.
    Async,
}

/// A module as seen by the partitioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Module id, a `./`-prefixed root-relative path with `/` separators.
    pub id: String,
    /// Name of the origin chunk.
    pub origin: String,
    pub origin_kind: OriginKind,
}

impl ModuleRecord {
    #[must_use]
    pub fn initial(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            origin_kind: OriginKind::Initial,
        }
    }

    #[must_use]
    pub fn dynamic(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            origin_kind: OriginKind::Async,
        }
    }
}

/// A named partition of dependency code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheGroup {
    /// Config key the group was declared under.
    pub key: String,
    /// Output chunk name.
    pub name: String,
    /// Module id predicate. `None` matches every module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<Condition>,
    pub priority: i32,
    pub reuse_existing_chunk: bool,
    pub chunks: ChunkSelector,
}

impl CacheGroup {
    #[must_use]
    pub fn selects(&self, record: &ModuleRecord) -> bool {
        self.chunks.allows(record.origin_kind)
            && self.test.as_ref().map_or(true, |t| t.is_match(&record.id))
    }

    fn from_config(key: &str, config: &CacheGroupConfig, chunks: ChunkSelector) -> Result<Self, Error> {
        Ok(Self {
            key: key.to_string(),
            name: config.name.clone().unwrap_or_else(|| key.to_string()),
            test: config.test.as_deref().map(Condition::new).transpose()?,
            priority: config.priority.unwrap_or(0),
            reuse_existing_chunk: config.reuse_existing_chunk.unwrap_or(false),
            chunks: config.chunks.unwrap_or(chunks),
        })
    }
}

/// What a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Module registry bootstrap for one entry.
    Runtime,
    Entry,
    Async,
    /// Extracted by a cache group.
    Split,
}

#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Module ids in first-seen order.
    pub modules: Vec<String>,
    /// Origin chunks that need this chunk loaded (split chunks only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_by: Vec<String>,
}

/// Result of partitioning.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
    #[serde(skip)]
    assignment: HashMap<String, usize>,
}

impl ChunkPlan {
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Name of the chunk a module was placed in.
    #[must_use]
    pub fn chunk_of(&self, module_id: &str) -> Option<&str> {
        self.assignment
            .get(module_id)
            .map(|&i| self.chunks[i].name.as_str())
    }

    /// Split chunks that must be loaded alongside `origin`.
    pub fn split_chunks_for<'a>(&'a self, origin: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks
            .iter()
            .filter(move |c| c.kind == ChunkKind::Split && c.required_by.iter().any(|o| o == origin))
    }

    /// Runtime chunk for an entry, if runtime chunks are enabled.
    #[must_use]
    pub fn runtime_for(&self, entry: &str) -> Option<&Chunk> {
        self.get(&runtime_chunk_name(entry))
    }
}

#[must_use]
pub fn runtime_chunk_name(entry: &str) -> String {
    format!("runtime~{entry}")
}

/// Immutable code-splitting policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPartitioner {
    cache_groups: Vec<CacheGroup>,
    runtime_chunk: bool,
    /// Carried for the emitter; has no effect on partitioning.
    minimize: bool,
}

impl Default for ChunkPartitioner {
    fn default() -> Self {
        Self::new(default_cache_groups(ChunkSelector::All), true, false)
    }
}

impl ChunkPartitioner {
    #[must_use]
    pub fn new(cache_groups: Vec<CacheGroup>, runtime_chunk: bool, minimize: bool) -> Self {
        Self {
            cache_groups,
            runtime_chunk,
            minimize,
        }
    }

    /// Build from `optimization` settings, merging cache groups over the defaults.
    pub fn from_config(config: &OptimizationConfig) -> Result<Self, Error> {
        let split = config.split_chunks.clone().unwrap_or_default();
        let chunks = split.chunks.unwrap_or_default();

        let mut declared: Vec<(String, CacheGroupConfig)> = default_cache_group_configs();
        for (key, value) in &split.cache_groups {
            if value == &serde_json::Value::Bool(false) {
                declared.retain(|(k, _)| k != key);
                continue;
            }
            let overrides: CacheGroupConfig =
                serde_json::from_value(value.clone()).map_err(|e| Error::InvalidOption {
                    key: format!("optimization.splitChunks.cacheGroups.{key}"),
                    message: e.to_string(),
                })?;
            match declared.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => merge_group(existing, overrides),
                None => declared.push((key.clone(), overrides)),
            }
        }

        let groups = declared
            .iter()
            .map(|(key, cfg)| CacheGroup::from_config(key, cfg, chunks))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(
            groups,
            config.runtime_chunk.unwrap_or(true),
            config.minimize.unwrap_or(false),
        ))
    }

    #[must_use]
    pub fn cache_groups(&self) -> &[CacheGroup] {
        &self.cache_groups
    }

    #[must_use]
    pub fn runtime_chunk(&self) -> bool {
        self.runtime_chunk
    }

    #[must_use]
    pub fn minimize(&self) -> bool {
        self.minimize
    }

    /// Highest-priority group selecting `record`; ties go to the earlier group.
    #[must_use]
    pub fn group_for(&self, record: &ModuleRecord) -> Option<&CacheGroup> {
        let mut best: Option<&CacheGroup> = None;
        for group in self.cache_groups.iter().filter(|g| g.selects(record)) {
            if best.map_or(true, |b| group.priority > b.priority) {
                best = Some(group);
            }
        }
        best
    }

    /// Assign every module to exactly one chunk.
    ///
    /// A module listed more than once keeps its first record.
    #[must_use]
    pub fn partition(&self, modules: &[ModuleRecord]) -> ChunkPlan {
        let mut seen = HashSet::new();
        let records: Vec<&ModuleRecord> = modules.iter().filter(|m| seen.insert(m.id.as_str())).collect();

        let mut origins: Vec<(&str, OriginKind)> = Vec::new();
        for &record in &records {
            if !origins.iter().any(|(name, _)| *name == record.origin) {
                origins.push((record.origin.as_str(), record.origin_kind));
            }
        }

        let mut origin_members: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for &record in &records {
            origin_members
                .entry(record.origin.as_str())
                .or_default()
                .insert(record.id.as_str());
        }

        // Group index per module, before reuse
        let mut grouped: BTreeMap<usize, Vec<&ModuleRecord>> = BTreeMap::new();
        let mut target: HashMap<&str, Target<'_>> = HashMap::new();
        for &record in &records {
            match self
                .group_for(record)
                .and_then(|g| self.cache_groups.iter().position(|c| std::ptr::eq(c, g)))
            {
                Some(idx) => {
                    grouped.entry(idx).or_default().push(record);
                    target.insert(&record.id, Target::Group(idx));
                }
                None => {
                    target.insert(&record.id, Target::Origin(&record.origin));
                }
            }
        }

        for (&idx, members) in &grouped {
            if !self.cache_groups[idx].reuse_existing_chunk {
                continue;
            }
            let selected: BTreeSet<&str> = members.iter().map(|m| m.id.as_str()).collect();
            let reused = origins
                .iter()
                .find(|(name, _)| origin_members.get(name) == Some(&selected));
            if let Some((name, _)) = reused {
                tracing::debug!(group = %self.cache_groups[idx].name, chunk = %name, "reusing existing chunk");
                for id in selected {
                    target.insert(id, Target::Origin(name));
                }
            }
        }

        let mut plan = ChunkPlan::default();

        if self.runtime_chunk {
            for (name, kind) in &origins {
                if *kind == OriginKind::Initial {
                    plan.chunks.push(Chunk {
                        name: runtime_chunk_name(name),
                        kind: ChunkKind::Runtime,
                        modules: Vec::new(),
                        required_by: Vec::new(),
                    });
                }
            }
        }

        let mut origin_index = HashMap::new();
        for (name, kind) in &origins {
            origin_index.insert(*name, plan.chunks.len());
            plan.chunks.push(Chunk {
                name: (*name).to_string(),
                kind: match kind {
                    OriginKind::Initial => ChunkKind::Entry,
                    OriginKind::Async => ChunkKind::Async,
                },
                modules: Vec::new(),
                required_by: Vec::new(),
            });
        }

        // Groups sharing a name share a chunk
        let mut group_index: HashMap<&str, usize> = HashMap::new();
        for &record in &records {
            let chunk_idx = match target[record.id.as_str()] {
                Target::Origin(name) => origin_index[name],
                Target::Group(idx) => {
                    let name = self.cache_groups[idx].name.as_str();
                    *group_index.entry(name).or_insert_with(|| {
                        plan.chunks.push(Chunk {
                            name: name.to_string(),
                            kind: ChunkKind::Split,
                            modules: Vec::new(),
                            required_by: Vec::new(),
                        });
                        plan.chunks.len() - 1
                    })
                }
            };
            let chunk = &mut plan.chunks[chunk_idx];
            chunk.modules.push(record.id.clone());
            if chunk.kind == ChunkKind::Split && !chunk.required_by.contains(&record.origin) {
                chunk.required_by.push(record.origin.clone());
            }
            plan.assignment.insert(record.id.clone(), chunk_idx);
        }

        // Split chunks are listed in group declaration order
        let split_start = plan
            .chunks
            .iter()
            .position(|c| c.kind == ChunkKind::Split)
            .unwrap_or(plan.chunks.len());
        let order: Vec<&str> = self.cache_groups.iter().map(|g| g.name.as_str()).collect();
        let mut splits = plan.chunks.split_off(split_start);
        splits.sort_by_key(|c| order.iter().position(|n| *n == c.name));
        plan.chunks.extend(splits);
        plan.assignment = plan
            .chunks
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.modules.iter().map(move |m| (m.clone(), i)))
            .collect();

        tracing::debug!(chunks = plan.chunks.len(), modules = records.len(), "partitioned");
        plan
    }
}

#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Origin(&'a str),
    Group(usize),
}

fn merge_group(existing: &mut CacheGroupConfig, overrides: CacheGroupConfig) {
    if overrides.test.is_some() {
        existing.test = overrides.test;
    }
    if overrides.name.is_some() {
        existing.name = overrides.name;
    }
    if overrides.priority.is_some() {
        existing.priority = overrides.priority;
    }
    if overrides.reuse_existing_chunk.is_some() {
        existing.reuse_existing_chunk = overrides.reuse_existing_chunk;
    }
    if overrides.chunks.is_some() {
        existing.chunks = overrides.chunks;
    }
}

fn default_cache_group_configs() -> Vec<(String, CacheGroupConfig)> {
    vec![
        (
            "defaultVendors".to_string(),
            CacheGroupConfig {
                test: Some(r"[\\/]node_modules[\\/]".to_string()),
                name: Some("vendors".to_string()),
                priority: Some(-10),
                reuse_existing_chunk: Some(true),
                chunks: None,
            },
        ),
        (
            "reactVendor".to_string(),
            CacheGroupConfig {
                test: Some(r"[\\/]node_modules[\\/](react|react-dom|react-router-dom)[\\/]".to_string()),
                name: Some("vendor-react".to_string()),
                priority: None,
                reuse_existing_chunk: None,
                chunks: Some(ChunkSelector::All),
            },
        ),
    ]
}

fn default_cache_groups(chunks: ChunkSelector) -> Vec<CacheGroup> {
    default_cache_group_configs()
        .iter()
        .filter_map(|(key, cfg)| CacheGroup::from_config(key, cfg, chunks).ok())
        .collect()
}
