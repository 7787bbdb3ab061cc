use super::AtnConfig;
use crate::atn::Atn;
use crate::context::{PredictionContext, PredictionContextCache, VisitedContexts};
use crate::error::{AtnError, Result};
use crate::hash::FastMap;
use crate::token::INVALID_ALT;
use fixedbitset::FixedBitSet;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Alternatives in conflict for a configuration set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictInfo {
    pub conflicted_alts: FixedBitSet,
    /// The conflict holds for every context, not just the ones seen
    pub exact: bool,
}

impl ConflictInfo {
    #[must_use]
    pub const fn new(conflicted_alts: FixedBitSet, exact: bool) -> Self {
        Self {
            conflicted_alts,
            exact,
        }
    }
}

/// A merge-on-insert set of configurations.
///
/// Configurations with the same state, alternative and semantic context
/// are never stored twice: adding one joins its context into the existing
/// entry. When two configurations share state and alternative but differ
/// in their predicate, both are kept.
///
/// The *ordered* variant, used for lexer simulation, only merges
/// configurations that are equal in every field and keeps insertion order
/// meaningful.
///
/// Sets are frozen before they are stored in a DFA state. A frozen set
/// rejects every mutation with [`AtnError::ReadOnly`] and caches its hash.
/// Equality and hashing ignore insertion order.
#[derive(Debug, Clone)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    merged: FastMap<u64, usize>,
    unmerged: Vec<usize>,
    ordered: bool,
    unique_alt: u32,
    conflict_info: Option<ConflictInfo>,
    has_semantic_context: bool,
    dips_into_outer_context: bool,
    outermost_config_set: bool,
    read_only: bool,
    cached_hash: Option<u64>,
}

impl Default for AtnConfigSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AtnConfigSet {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ordering(false)
    }

    /// A set that merges only equal configurations
    #[must_use]
    pub fn new_ordered() -> Self {
        Self::with_ordering(true)
    }

    fn with_ordering(ordered: bool) -> Self {
        Self {
            configs: Vec::new(),
            merged: FastMap::default(),
            unmerged: Vec::new(),
            ordered,
            unique_alt: INVALID_ALT,
            conflict_info: None,
            has_semantic_context: false,
            dips_into_outer_context: false,
            outermost_config_set: false,
            read_only: false,
            cached_hash: None,
        }
    }

    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        self.ordered
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(AtnError::read_only("configuration set"))
        } else {
            Ok(())
        }
    }

    fn key(&self, config: &AtnConfig) -> u64 {
        if self.ordered {
            config.structural_hash()
        } else {
            config.merge_key()
        }
    }

    fn can_merge(&self, incoming: &AtnConfig, key: u64, existing: &AtnConfig) -> bool {
        if self.ordered {
            return incoming == existing;
        }
        incoming.state() == existing.state()
            && incoming.alt() == existing.alt()
            && key == self.key(existing)
            && incoming.semantic_context() == existing.semantic_context()
    }

    /// Add `config`, merging it into an existing entry when possible.
    ///
    /// Returns `false` when the set did not change: the configuration was
    /// merged and the joined context is the one already stored.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn add(&mut self, config: AtnConfig, cache: &mut PredictionContextCache) -> Result<bool> {
        self.ensure_writable()?;
        debug_assert!(!self.outermost_config_set || !config.reaches_into_outer_context());

        let key = self.key(&config);
        let merged_index = self.merged.get(&key).copied();
        if let Some(index) = merged_index {
            if self.can_merge(&config, key, &self.configs[index]) {
                return Ok(self.merge_into(index, &config, cache));
            }
        }

        for position in 0..self.unmerged.len() {
            let index = self.unmerged[position];
            if self.can_merge(&config, key, &self.configs[index]) {
                let changed = self.merge_into(index, &config, cache);
                if changed && merged_index.is_none() {
                    self.unmerged.remove(position);
                    self.merged.insert(key, index);
                }
                return Ok(changed);
            }
        }

        let index = self.configs.len();
        self.update_properties_for_added(&config);
        self.configs.push(config);
        if merged_index.is_none() {
            self.merged.insert(key, index);
        } else {
            self.unmerged.push(index);
        }
        if index == 0 {
            self.unique_alt = self.configs[0].alt();
        }
        Ok(true)
    }

    fn merge_into(
        &mut self,
        index: usize,
        config: &AtnConfig,
        cache: &mut PredictionContextCache,
    ) -> bool {
        self.dips_into_outer_context |= config.reaches_into_outer_context();
        let existing = &mut self.configs[index];
        existing.widen_outer_context_depth(config.outer_context_depth());
        if config.is_precedence_filter_suppressed() {
            existing.suppress_precedence_filter();
        }
        let joined = PredictionContext::join(existing.context(), config.context(), cache);
        if Arc::ptr_eq(&joined, existing.context()) {
            return false;
        }
        existing.set_context(joined);
        true
    }

    fn update_properties_for_added(&mut self, config: &AtnConfig) {
        if !self.configs.is_empty() && self.unique_alt != config.alt() {
            self.unique_alt = INVALID_ALT;
        }
        self.has_semantic_context |= !config.semantic_context().is_none();
        self.dips_into_outer_context |= config.reaches_into_outer_context();
    }

    /// Add every configuration, returning whether any changed the set
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn add_all(
        &mut self,
        configs: impl IntoIterator<Item = AtnConfig>,
        cache: &mut PredictionContextCache,
    ) -> Result<bool> {
        let mut changed = false;
        for config in configs {
            changed |= self.add(config, cache)?;
        }
        Ok(changed)
    }

    /// Whether an equal configuration is in the set
    #[must_use]
    pub fn contains(&self, config: &AtnConfig) -> bool {
        let key = self.key(config);
        if let Some(&index) = self.merged.get(&key) {
            if self.configs[index] == *config {
                return true;
            }
        }
        self.unmerged
            .iter()
            .any(|&index| self.configs[index] == *config)
    }

    /// Configuration `index` in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn get(&self, index: usize) -> &AtnConfig {
        &self.configs[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Remove every configuration and reset the aggregate flags
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.configs.clear();
        self.merged.clear();
        self.unmerged.clear();
        self.unique_alt = INVALID_ALT;
        self.conflict_info = None;
        self.has_semantic_context = false;
        self.dips_into_outer_context = false;
        Ok(())
    }

    /// Not supported
    ///
    /// # Errors
    ///
    /// Always fails with [`AtnError::Unsupported`].
    pub fn remove(&mut self, _config: &AtnConfig) -> Result<bool> {
        Err(AtnError::unsupported("removing a configuration"))
    }

    /// Not supported
    ///
    /// # Errors
    ///
    /// Always fails with [`AtnError::Unsupported`].
    pub fn retain_all(&mut self, _configs: &[AtnConfig]) -> Result<bool> {
        Err(AtnError::unsupported("retaining a subset of configurations"))
    }

    /// Make the set read-only and cache its hash. Idempotent.
    pub fn freeze(&mut self) {
        if !self.read_only {
            self.read_only = true;
            self.cached_hash = Some(self.compute_hash());
        }
    }

    /// A copy of this set, frozen or writable
    #[must_use]
    pub fn clone_set(&self, read_only: bool) -> Self {
        let mut copy = self.clone();
        copy.read_only = false;
        copy.cached_hash = None;
        if read_only {
            copy.freeze();
        }
        copy
    }

    /// Canonicalize every context through the automaton's shared cache,
    /// then freeze the set.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is already frozen.
    pub fn optimize_configs(&mut self, atn: &Atn) -> Result<()> {
        self.ensure_writable()?;
        if atn.options().cache_contexts && !self.configs.is_empty() {
            let mut visited = VisitedContexts::new();
            for config in &mut self.configs {
                let cached = atn
                    .context_cache()
                    .cached_context_with(config.context(), &mut visited);
                config.set_context(cached);
            }
        }
        self.freeze();
        Ok(())
    }

    /// The alternatives in conflict, or else every alternative present
    #[must_use]
    pub fn represented_alternatives(&self) -> FixedBitSet {
        if let Some(info) = &self.conflict_info {
            return info.conflicted_alts.clone();
        }
        let max_alt = self.configs.iter().map(AtnConfig::alt).max().unwrap_or(0);
        let mut alts = FixedBitSet::with_capacity(max_alt as usize + 1);
        for config in &self.configs {
            alts.insert(config.alt() as usize);
        }
        alts
    }

    /// The automaton states present
    #[must_use]
    pub fn states(&self) -> BTreeSet<usize> {
        self.configs.iter().map(AtnConfig::state).collect()
    }

    /// The single alternative every configuration predicts, or
    /// [`INVALID_ALT`] once two alternatives have been seen
    #[must_use]
    pub const fn unique_alt(&self) -> u32 {
        self.unique_alt
    }

    #[must_use]
    pub const fn has_semantic_context(&self) -> bool {
        self.has_semantic_context
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn clear_explicit_semantic_context(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.has_semantic_context = false;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn mark_explicit_semantic_context(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.has_semantic_context = true;
        Ok(())
    }

    #[must_use]
    pub const fn dips_into_outer_context(&self) -> bool {
        self.dips_into_outer_context
    }

    #[must_use]
    pub const fn is_outermost_config_set(&self) -> bool {
        self.outermost_config_set
    }

    /// Mark the set as the outermost configuration set of a prediction.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen, and with
    /// [`AtnError::Unsupported`] when clearing the mark once set.
    pub fn set_outermost_config_set(&mut self, outermost: bool) -> Result<()> {
        self.ensure_writable()?;
        if self.outermost_config_set && !outermost {
            return Err(AtnError::unsupported("clearing the outermost configuration set mark"));
        }
        debug_assert!(!outermost || !self.dips_into_outer_context);
        self.outermost_config_set = outermost;
        Ok(())
    }

    #[must_use]
    pub const fn conflict_info(&self) -> Option<&ConflictInfo> {
        self.conflict_info.as_ref()
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn set_conflict_info(&mut self, conflict_info: Option<ConflictInfo>) -> Result<()> {
        self.ensure_writable()?;
        self.conflict_info = conflict_info;
        Ok(())
    }

    #[must_use]
    pub fn conflicting_alts(&self) -> Option<&FixedBitSet> {
        self.conflict_info.as_ref().map(|info| &info.conflicted_alts)
    }

    #[must_use]
    pub fn is_exact_conflict(&self) -> bool {
        self.conflict_info.as_ref().is_some_and(|info| info.exact)
    }

    /// Configurations ordered by alternative, state and predicate text,
    /// for display
    #[must_use]
    pub fn sorted_configs(&self) -> Vec<&AtnConfig> {
        let mut sorted: Vec<&AtnConfig> = self.configs.iter().collect();
        sorted.sort_by_cached_key(|config| {
            (
                config.alt(),
                config.state(),
                config.semantic_context().to_string(),
            )
        });
        sorted
    }

    fn compute_hash(&self) -> u64 {
        self.configs
            .iter()
            .fold(0u64, |acc, config| acc.wrapping_add(config.structural_hash()))
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.cached_hash, other.cached_hash) {
            if a != b {
                return false;
            }
        }
        self.configs.len() == other.configs.len()
            && self.configs.iter().all(|config| other.contains(config))
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash.unwrap_or_else(|| self.compute_hash()));
    }
}

impl<'a> IntoIterator for &'a AtnConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, config) in self.sorted_configs().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{config}")?;
        }
        f.write_str("]")?;
        if self.has_semantic_context {
            f.write_str(",hasSemanticContext=true")?;
        }
        if self.unique_alt != INVALID_ALT {
            write!(f, ",uniqueAlt={}", self.unique_alt)?;
        }
        if let Some(alts) = self.conflicting_alts() {
            let alts: Vec<String> = alts.ones().map(|alt| alt.to_string()).collect();
            write!(f, ",conflictingAlts={{{}}}", alts.join(", "))?;
            if !self.is_exact_conflict() {
                f.write_str(",inexact")?;
            }
        }
        if self.dips_into_outer_context {
            f.write_str(",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}
