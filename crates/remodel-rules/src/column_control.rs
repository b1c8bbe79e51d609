//! Column-to-grid partitioning
//!
//! A column control is a run of sibling marker nodes:
//!
//! ```text
//! colctrl (layout=2;cq-colctrl-lt0)   first marker
//! text-a                              column 0
//! colctrl (controlType=break)
//! text-b                              column 1
//! colctrl (controlType=end)
//! ```
//!
//! [`ColumnControlRule`] matches the first marker of a complete run and
//! replaces the run by grid metadata, either inline (one metadata node in
//! front of each column's content) or by moving each column into its own
//! container.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use remodel_tree::{NodeId, PropertyValue, StoreError, Tree, DEFAULT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RewriteError;
use crate::rule::{FinalNodeSet, Rule, DEFAULT_RANKING};

/// Marker discriminator property
pub const RESOURCE_TYPE: &str = "sling:resourceType";
/// Layout tag on the first marker
pub const LAYOUT: &str = "layout";
/// Marker kind on break and end markers
pub const CONTROL_TYPE: &str = "controlType";
/// `controlType` of a column break
pub const BREAK: &str = "break";
/// `controlType` of the closing marker
pub const END: &str = "end";
/// Child holding per-breakpoint grid metadata
pub const RESPONSIVE: &str = "cq:responsive";
/// Column span property
pub const WIDTH: &str = "width";
/// Column offset property
pub const OFFSET: &str = "offset";

/// Default marker resource type
pub const DEFAULT_RESOURCE_TYPE: &str = "foundation/components/parsys/colctrl";

const COLUMN_HINT: &str = "column";
const CONTAINER_HINT: &str = "container";

static WIDTH_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)=\[([0-9,]+)\]$").expect("width entry regex"));

/// Output shape of a partitioned run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    /// Column content stays in place behind per-column metadata nodes
    #[default]
    Inline,
    /// Each column moves into a new container node
    Container,
}

/// Column control configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnControlConfig {
    /// Rule id, derived from the layout when absent
    pub id: Option<String>,
    /// Rule ranking, lowest priority when absent
    pub ranking: Option<i32>,
    /// Marker resource type
    pub resource_type: String,
    /// Layout tag of the first marker, `<columns>;<name>`
    pub layout: String,
    /// `<breakpoint>=[w1,w2,...]` entries
    pub column_widths: Vec<String>,
    /// Total grid width every breakpoint must add up to
    pub grid_width: i64,
    /// Output shape
    pub mode: GridMode,
    /// Resource type of created containers, required for [`GridMode::Container`]
    pub container_resource_type: Option<String>,
    /// Offsets are the running sum of prior widths
    pub accumulate_offsets: bool,
}

impl Default for ColumnControlConfig {
    fn default() -> Self {
        Self {
            id: None,
            ranking: None,
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            layout: String::new(),
            column_widths: Vec::new(),
            grid_width: 12,
            mode: GridMode::Inline,
            container_resource_type: None,
            accumulate_offsets: true,
        }
    }
}

impl ColumnControlConfig {
    /// Create config for a layout and width entries
    #[must_use]
    pub fn new(layout: impl Into<String>, column_widths: &[&str]) -> Self {
        Self {
            layout: layout.into(),
            column_widths: column_widths.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Switch to container mode
    #[must_use]
    pub fn with_containers(mut self, resource_type: impl Into<String>) -> Self {
        self.mode = GridMode::Container;
        self.container_resource_type = Some(resource_type.into());
        self
    }

    /// Set the ranking
    #[must_use]
    pub fn with_ranking(mut self, ranking: i32) -> Self {
        self.ranking = Some(ranking);
        self
    }
}

/// Marker run found behind a first marker
#[derive(Debug, Clone)]
struct MarkerRun {
    breaks: Vec<NodeId>,
    end: NodeId,
    buckets: Vec<Vec<NodeId>>,
}

enum RunScan {
    Complete(MarkerRun),
    Broken(String),
}

/// Rule partitioning column-control runs into grid columns
#[derive(Debug, Clone)]
pub struct ColumnControlRule {
    id: String,
    title: String,
    ranking: i32,
    resource_type: String,
    layout: String,
    columns: usize,
    widths: BTreeMap<String, Vec<i64>>,
    mode: GridMode,
    container_resource_type: String,
    accumulate_offsets: bool,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl ColumnControlRule {
    /// Validate a configuration and build the rule
    ///
    /// # Errors
    /// Returns a configuration error for a blank or malformed layout, malformed
    /// width entries, width vectors whose length differs from the column
    /// count or whose sum differs from the grid width, and a missing container
    /// resource type in container mode
    pub fn activate(config: &ColumnControlConfig) -> Result<Self, RewriteError> {
        let resource_type = if blank(&config.resource_type) {
            DEFAULT_RESOURCE_TYPE.to_string()
        } else {
            config.resource_type.clone()
        };

        if blank(&config.layout) {
            return Err(RewriteError::configuration("layout", "layout value is required"));
        }
        let columns: usize = config
            .layout
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| RewriteError::configuration("layout", format!("unknown layout format '{}'", config.layout)))?;
        if columns == 0 {
            return Err(RewriteError::configuration("layout", "column count must be positive"));
        }
        if config.grid_width <= 0 {
            return Err(RewriteError::configuration("grid_width", "grid width must be positive"));
        }

        if config.column_widths.is_empty() {
            return Err(RewriteError::configuration("column_widths", "at least one width entry is required"));
        }
        let mut widths = BTreeMap::new();
        for entry in &config.column_widths {
            let (breakpoint, values) = parse_width_entry(entry)?;
            if values.len() != columns {
                return Err(RewriteError::configuration(
                    "column_widths",
                    format!("'{entry}' has {} widths, layout has {columns} columns", values.len()),
                ));
            }
            let sum: i64 = values.iter().sum();
            if sum != config.grid_width {
                return Err(RewriteError::configuration(
                    "column_widths",
                    format!("'{entry}' adds up to {sum}, grid width is {}", config.grid_width),
                ));
            }
            if widths.insert(breakpoint.clone(), values).is_some() {
                return Err(RewriteError::configuration(
                    "column_widths",
                    format!("breakpoint '{breakpoint}' is defined twice"),
                ));
            }
        }

        let container_resource_type = match config.mode {
            GridMode::Inline => String::new(),
            GridMode::Container => match config.container_resource_type.as_deref() {
                Some(value) if !blank(value) => value.to_string(),
                _ => {
                    return Err(RewriteError::configuration(
                        "container_resource_type",
                        "required in container mode",
                    ))
                }
            },
        };

        let described: Vec<String> = widths
            .iter()
            .map(|(name, values)| {
                let list: Vec<String> = values.iter().map(ToString::to_string).collect();
                format!("{name}=[{}]", list.join(","))
            })
            .collect();
        let title = format!("ColumnControl ('{}' => {})", config.layout, described.join(","));
        let id = config
            .id
            .clone()
            .unwrap_or_else(|| format!("column-control:{}", config.layout));

        Ok(Self {
            id,
            title,
            ranking: config.ranking.unwrap_or(DEFAULT_RANKING),
            resource_type,
            layout: config.layout.clone(),
            columns,
            widths,
            mode: config.mode,
            container_resource_type,
            accumulate_offsets: config.accumulate_offsets,
        })
    }

    /// Configured column count
    #[inline]
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Width vector per breakpoint
    #[inline]
    #[must_use]
    pub fn widths(&self) -> &BTreeMap<String, Vec<i64>> {
        &self.widths
    }

    fn is_marker(&self, tree: &Tree, node: NodeId) -> Result<bool, StoreError> {
        Ok(tree
            .property(node, RESOURCE_TYPE)?
            .and_then(PropertyValue::as_str)
            == Some(self.resource_type.as_str()))
    }

    fn is_run_start(&self, tree: &Tree, node: NodeId) -> Result<bool, StoreError> {
        Ok(self.is_marker(tree, node)?
            && tree.property(node, LAYOUT)?.and_then(PropertyValue::as_str) == Some(self.layout.as_str()))
    }

    fn scan_run(&self, tree: &Tree, first: NodeId) -> Result<RunScan, StoreError> {
        if !self.is_run_start(tree, first)? {
            return Ok(RunScan::Broken("not the first marker of a run".to_string()));
        }
        let (Some(parent), Some(position)) = (tree.parent(first)?, tree.index_of(first)?) else {
            return Ok(RunScan::Broken("marker has no parent".to_string()));
        };

        let siblings = tree.children(parent)?.to_vec();
        let mut breaks = Vec::new();
        let mut buckets = vec![Vec::new()];
        for sibling in siblings.into_iter().skip(position + 1) {
            if !self.is_marker(tree, sibling)? {
                if let Some(bucket) = buckets.last_mut() {
                    bucket.push(sibling);
                }
                continue;
            }
            if tree.property(sibling, LAYOUT)?.is_some() {
                return Ok(RunScan::Broken("another column control starts inside the run".to_string()));
            }
            match tree.property(sibling, CONTROL_TYPE)?.and_then(PropertyValue::as_str) {
                Some(BREAK) => {
                    if breaks.len() + 1 >= self.columns {
                        return Ok(RunScan::Broken(format!(
                            "more than {} breaks",
                            self.columns - 1
                        )));
                    }
                    breaks.push(sibling);
                    buckets.push(Vec::new());
                }
                Some(END) => {
                    if breaks.len() + 1 != self.columns {
                        return Ok(RunScan::Broken(format!(
                            "expected {} breaks, found {}",
                            self.columns - 1,
                            breaks.len()
                        )));
                    }
                    return Ok(RunScan::Complete(MarkerRun {
                        breaks,
                        end: sibling,
                        buckets,
                    }));
                }
                other => {
                    return Ok(RunScan::Broken(format!(
                        "unexpected marker with controlType {other:?}"
                    )))
                }
            }
        }
        Ok(RunScan::Broken("run has no end marker".to_string()))
    }

    fn complete_run(&self, tree: &Tree, first: NodeId) -> Result<MarkerRun, RewriteError> {
        match self.scan_run(tree, first)? {
            RunScan::Complete(run) => Ok(run),
            RunScan::Broken(reason) => Err(RewriteError::malformed_run(tree.path(first)?, reason)),
        }
    }

    fn offset(&self, widths: &[i64], buckets: &[Vec<NodeId>], column: usize) -> i64 {
        let prior: i64 = widths[..column].iter().sum();
        if self.accumulate_offsets || buckets[..column].iter().all(Vec::is_empty) {
            prior
        } else {
            0
        }
    }

    fn add_responsive(
        &self,
        tree: &mut Tree,
        node: NodeId,
        column: usize,
        buckets: &[Vec<NodeId>],
    ) -> Result<(), StoreError> {
        let responsive = tree.add_child(node, RESPONSIVE, DEFAULT_TYPE)?;
        for (breakpoint, widths) in &self.widths {
            let entry = tree.add_child(responsive, breakpoint, DEFAULT_TYPE)?;
            tree.set_property(entry, WIDTH, widths[column])?;
            tree.set_property(entry, OFFSET, self.offset(widths, buckets, column))?;
        }
        Ok(())
    }

    fn apply_inline(
        &self,
        tree: &mut Tree,
        first: NodeId,
        parent: NodeId,
        run: &MarkerRun,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        let openers: Vec<NodeId> = std::iter::once(first).chain(run.breaks.iter().copied()).collect();
        let mut head = None;
        for (column, opener) in openers.into_iter().enumerate() {
            let index = tree.index_of(opener)?.unwrap_or_default();
            let name = tree.unique_child_name(parent, COLUMN_HINT)?;
            let meta = tree.insert_child(parent, index, &name, DEFAULT_TYPE)?;
            self.add_responsive(tree, meta, column, &run.buckets)?;
            tree.remove(opener)?;
            finals.insert_subtree(tree, meta)?;
            head.get_or_insert(meta);
        }
        tree.remove(run.end)?;
        Ok(head)
    }

    fn apply_containers(
        &self,
        tree: &mut Tree,
        first: NodeId,
        parent: NodeId,
        run: &MarkerRun,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        let start = tree.index_of(first)?.unwrap_or_default();
        tree.remove(first)?;

        let mut head = None;
        for (column, bucket) in run.buckets.iter().enumerate() {
            let name = tree.unique_child_name(parent, CONTAINER_HINT)?;
            let container = tree.insert_child(parent, start + column, &name, DEFAULT_TYPE)?;
            tree.set_property(container, RESOURCE_TYPE, self.container_resource_type.as_str())?;
            self.add_responsive(tree, container, column, &run.buckets)?;
            finals.insert_subtree(tree, container)?;
            for node in bucket {
                tree.move_to(*node, container)?;
            }
            head.get_or_insert(container);
        }

        for marker in &run.breaks {
            tree.remove(*marker)?;
        }
        tree.remove(run.end)?;
        Ok(head)
    }
}

fn parse_width_entry(entry: &str) -> Result<(String, Vec<i64>), RewriteError> {
    let caps = WIDTH_ENTRY.captures(entry.trim()).ok_or_else(|| {
        RewriteError::configuration("column_widths", format!("invalid width entry '{entry}'"))
    })?;
    let breakpoint = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let values = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .split(',')
        .map(|w| {
            w.parse::<i64>().map_err(|_| {
                RewriteError::configuration("column_widths", format!("invalid width '{w}' in '{entry}'"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((breakpoint, values))
}

impl Rule for ColumnControlRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn ranking(&self) -> i32 {
        self.ranking
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> Result<bool, RewriteError> {
        Ok(matches!(self.scan_run(tree, node)?, RunScan::Complete(_)))
    }

    fn apply(
        &self,
        tree: &mut Tree,
        node: NodeId,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        let run = self.complete_run(tree, node)?;
        let parent = tree
            .parent(node)?
            .ok_or_else(|| RewriteError::malformed_run(format!("{node}"), "marker has no parent"))?;
        debug!(
            rule = %self.id,
            node = %tree.path(node)?,
            columns = self.columns,
            mode = ?self.mode,
            "partitioning column control"
        );
        match self.mode {
            GridMode::Inline => self.apply_inline(tree, node, parent, &run, finals),
            GridMode::Container => self.apply_containers(tree, node, parent, &run, finals),
        }
    }
}
