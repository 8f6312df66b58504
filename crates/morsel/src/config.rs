use morsel_core::{schema::ForeignKey, Error, Result, TableRef};

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Options controlling a subsetting run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Proportion of each table to copy, in `(0, 1]`.
    pub fraction: f64,

    /// Size targets by the logarithmic formula instead of linearly.
    pub logarithmic: bool,

    /// Per-parent child fetch cap during child expansion. Prioritized rows
    /// are exempt.
    pub children: usize,

    /// Depth budget for child expansion.
    pub max_depth: u32,

    /// Number of buffered rows that triggers a flush. `0` flushes each row
    /// as it is copied.
    pub buffer: usize,

    /// Schemas to copy in addition to the driver's default schema.
    pub schemas: Vec<String>,

    /// Include-only table patterns (`*` wildcards, optionally
    /// schema-qualified). Empty means every table.
    pub tables: Vec<String>,

    /// Exclude table patterns.
    pub exclude_tables: Vec<String>,

    /// Tables to copy in full.
    pub full_tables: Vec<String>,

    /// Specific rows to force into the target, with their descendants.
    pub force_rows: Vec<ForcedRow>,

    /// User-supplied logical foreign keys, merged with the catalog's.
    pub constraints: Vec<ForeignKey>,
}

impl Options {
    pub fn new(fraction: f64) -> Result<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::configuration(format!(
                "fraction must be greater than 0 and no greater than 1; got {fraction}"
            )));
        }
        Ok(Self {
            fraction,
            logarithmic: false,
            children: 3,
            max_depth: 3,
            buffer: 1000,
            schemas: vec![],
            tables: vec![],
            exclude_tables: vec![],
            full_tables: vec![],
            force_rows: vec![],
            constraints: vec![],
        })
    }

    /// Merges a JSON configuration file into these options.
    pub fn apply_config_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let file: ConfigFile = serde_json::from_str(&text).map_err(|err| {
            Error::configuration(format!("cannot parse {}: {err}", path.display()))
        })?;

        for (child, constraints) in file.constraints {
            let child = TableRef::parse(&child);
            for raw in constraints {
                self.constraints.push(raw.into_foreign_key(&child)?);
            }
        }
        self.tables.extend(file.tables);
        self.schemas.extend(file.schemas);
        self.exclude_tables.extend(file.exclude_tables);
        Ok(())
    }
}

/// A `table:pk` directive naming a row that must reach the target.
#[derive(Debug, Clone)]
pub struct ForcedRow {
    pub table: TableRef,
    pub key: String,
}

impl ForcedRow {
    /// Parses `table:pk` or `schema.table:pk`. Only single-column keys are
    /// supported; the key text is interpreted against the key column's type
    /// once the schema is known.
    pub fn parse(directive: &str) -> Result<Self> {
        let Some((table, key)) = directive.split_once(':') else {
            return Err(Error::configuration(format!(
                "force directive `{directive}` is not of the form table:pk"
            )));
        };
        if table.is_empty() || key.is_empty() {
            return Err(Error::configuration(format!(
                "force directive `{directive}` is not of the form table:pk"
            )));
        }
        Ok(Self {
            table: TableRef::parse(table),
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    constraints: HashMap<String, Vec<RawConstraint>>,
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    schemas: Vec<String>,
    #[serde(default, rename = "exclude-tables")]
    exclude_tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawConstraint {
    #[serde(default)]
    referred_schema: Option<String>,
    referred_table: String,
    referred_columns: Vec<String>,
    constrained_columns: Vec<String>,
}

impl RawConstraint {
    fn into_foreign_key(self, child: &TableRef) -> Result<ForeignKey> {
        if self.constrained_columns.is_empty() {
            return Err(Error::configuration(format!(
                "constraint on `{child}` has no constrained columns"
            )));
        }
        if self.constrained_columns.len() != self.referred_columns.len() {
            return Err(Error::configuration(format!(
                "constraint on `{child}` has {} constrained columns but {} referred columns",
                self.constrained_columns.len(),
                self.referred_columns.len()
            )));
        }
        Ok(ForeignKey {
            name: None,
            table: child.clone(),
            columns: self.constrained_columns,
            referred_table: TableRef::new(self.referred_schema, self.referred_table),
            referred_columns: self.referred_columns,
            logical: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_bounds() {
        assert!(Options::new(0.0).is_err());
        assert!(Options::new(-0.5).is_err());
        assert!(Options::new(1.5).is_err());
        assert!(Options::new(f64::NAN).is_err());
        assert!(Options::new(0.25).is_ok());
        assert!(Options::new(1.0).is_ok());
    }

    #[test]
    fn forced_row_parsing() {
        let forced = ForcedRow::parse("orders:42").unwrap();
        assert_eq!(forced.table, TableRef::bare("orders"));
        assert_eq!(forced.key, "42");

        let forced = ForcedRow::parse("sales.orders:42").unwrap();
        assert_eq!(forced.table, TableRef::parse("sales.orders"));

        assert!(ForcedRow::parse("orders").is_err());
        assert!(ForcedRow::parse(":42").is_err());
        assert!(ForcedRow::parse("orders:").is_err());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("morsel-config-test.json");
        std::fs::write(
            &path,
            r#"{
                "constraints": {
                    "city": [{
                        "referred_table": "state",
                        "referred_columns": ["abbrev"],
                        "constrained_columns": ["state_abbrev"]
                    }]
                },
                "tables": ["state", "city"],
                "exclude-tables": ["zep*"]
            }"#,
        )
        .unwrap();

        let mut options = Options::new(0.25).unwrap();
        options.apply_config_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(options.tables, ["state", "city"]);
        assert_eq!(options.exclude_tables, ["zep*"]);
        assert_eq!(options.constraints.len(), 1);
        let fk = &options.constraints[0];
        assert!(fk.logical);
        assert_eq!(fk.table, TableRef::bare("city"));
        assert_eq!(fk.referred_table, TableRef::bare("state"));
        assert_eq!(fk.columns, ["state_abbrev"]);
        assert_eq!(fk.referred_columns, ["abbrev"]);
    }

    #[test]
    fn config_file_rejects_ragged_columns() {
        let dir = std::env::temp_dir();
        let path = dir.join("morsel-config-ragged.json");
        std::fs::write(
            &path,
            r#"{
                "constraints": {
                    "city": [{
                        "referred_table": "state",
                        "referred_columns": ["abbrev", "name"],
                        "constrained_columns": ["state_abbrev"]
                    }]
                }
            }"#,
        )
        .unwrap();

        let mut options = Options::new(0.25).unwrap();
        let err = options.apply_config_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.is_configuration());
    }
}
