use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One entry from the registry dump. Ephemeral: decoded, tallied, dropped.
/// Dependencies are a set, so a record naming the same dependency twice
/// contributes a single edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub dependencies: BTreeSet<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, dependencies: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().collect(),
        }
    }
}

/// Which aggregate the scan builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Per-name direct dependant counts (the ranking input).
    Counts,
    /// Full inverse dependency map: name -> sorted dependant names.
    Dependants,
    /// The inverse map expanded to its transitive closure: every package
    /// reachable through any chain of dependants.
    TransitiveDependants,
    /// Per-name transitive dependant counts, ranked like direct counts.
    TransitiveCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Json,
    /// `| # | name | count |` table; counts mode only.
    Markdown,
}

/// How to find the package name and dependency names inside a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// `{"name": ..., "dependencies": [...]}` or the package.json object form.
    Flat,
    /// Raw registry export rows (`{"id": ..., "doc": {...}}`), taking the
    /// latest version's dependencies.
    Registry,
}

/// Mapping from package name to the number of distinct records that declare
/// it as a dependency. Owned by one component at a time; partial tables are
/// handed to the orchestrator by value and merged at the join barrier.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TallyTable {
    counts: HashMap<String, u64>,
}

impl TallyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &PackageRecord) {
        for dep in &record.dependencies {
            *self.counts.entry(dep.clone()).or_insert(0) += 1;
        }
    }

    /// Key-wise sum. Commutative and associative, so the order in which
    /// worker partials arrive never changes the result.
    pub fn merge(&mut self, other: TallyTable) {
        for (name, count) in other.counts {
            *self.counts.entry(name).or_insert(0) += count;
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, i.e. the total number of dependency edges seen.
    pub fn total_edges(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn into_counts(self) -> HashMap<String, u64> {
        self.counts
    }

    /// Overwrites one entry; used when counts are derived rather than
    /// accumulated record by record.
    pub fn set(&mut self, name: impl Into<String>, count: u64) {
        self.counts.insert(name.into(), count);
    }
}

/// Inverse dependency map: dependency name -> distinct dependant names.
/// BTree containers keep serialization deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependantMap {
    dependants: BTreeMap<String, BTreeSet<String>>,
}

impl DependantMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &PackageRecord) {
        for dep in &record.dependencies {
            self.dependants
                .entry(dep.clone())
                .or_default()
                .insert(record.name.clone());
        }
    }

    /// Key-wise set union; same merge discipline as [`TallyTable`].
    pub fn merge(&mut self, other: DependantMap) {
        for (name, dependants) in other.dependants {
            self.dependants.entry(name).or_default().extend(dependants);
        }
    }

    pub fn dependants_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.dependants.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.dependants.iter()
    }

    pub fn insert(&mut self, name: impl Into<String>, dependants: BTreeSet<String>) {
        self.dependants.insert(name.into(), dependants);
    }

    pub fn len(&self) -> usize {
        self.dependants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependants.is_empty()
    }
}

impl crate::domain::ports::Accumulate for TallyTable {
    fn add(&mut self, record: &PackageRecord) {
        TallyTable::add(self, record);
    }

    fn merge(&mut self, other: Self) {
        TallyTable::merge(self, other);
    }
}

impl crate::domain::ports::Accumulate for DependantMap {
    fn add(&mut self, record: &PackageRecord) {
        DependantMap::add(self, record);
    }

    fn merge(&mut self, other: Self) {
        DependantMap::merge(self, other);
    }
}

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub count: u64,
}

/// Scan bookkeeping surfaced to the logging collaborator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub records_processed: u64,
    pub records_skipped: u64,
}

impl ScanStats {
    pub fn merge(&mut self, other: ScanStats) {
        self.records_processed += other.records_processed;
        self.records_skipped += other.records_skipped;
    }

    pub fn total_records(&self) -> u64 {
        self.records_processed + self.records_skipped
    }
}

/// What a completed scan hands to the rank step.
#[derive(Debug, Clone)]
pub enum ScanProduct {
    Counts(TallyTable),
    Dependants(DependantMap),
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub product: ScanProduct,
    pub stats: ScanStats,
}

/// Output of the (pure) rank step, ready for serialization.
#[derive(Debug, Clone)]
pub enum Report {
    Ranked(Vec<RankedEntry>),
    Dependants(DependantMap),
}
