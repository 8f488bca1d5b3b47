//! Flow dataset model and CSV I/O.
//!
//! A [`Dataset`] keeps the input header so that files pass through the
//! pipeline with their original column order. Columns the pipeline knows
//! about are parsed into typed [`FlowRecord`] fields; every other column is
//! carried verbatim. New columns (`class`, the engineered counts) are
//! appended on write.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use tracing::debug;

use crate::error::DatasetError;

/// Columns with a fixed meaning in NetFlow exports and downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SrcAddr,
    DstAddr,
    SrcPort,
    DstPort,
    Duration,
    Packets,
    Octets,
    App,
    Class,
    DstAddrCount,
    SrcPortCount,
    DstPortUnique,
}

impl Field {
    /// Columns every flow file must carry.
    pub const REQUIRED: [Field; 7] = [
        Field::SrcAddr,
        Field::DstAddr,
        Field::SrcPort,
        Field::DstPort,
        Field::Duration,
        Field::Packets,
        Field::Octets,
    ];

    /// Typed input columns whose cell text may differ from the parsed value's
    /// canonical formatting (`1.50`, `0.0`, `080`).
    pub const NUMERIC_INPUT: [Field; 5] = [
        Field::SrcPort,
        Field::DstPort,
        Field::Duration,
        Field::Packets,
        Field::Octets,
    ];

    /// Per-source-address columns produced by feature engineering.
    pub const ENGINEERED: [Field; 3] = [
        Field::DstAddrCount,
        Field::SrcPortCount,
        Field::DstPortUnique,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SrcAddr => "srcaddr",
            Self::DstAddr => "dstaddr",
            Self::SrcPort => "srcport",
            Self::DstPort => "dstport",
            Self::Duration => "duration",
            Self::Packets => "dPkts",
            Self::Octets => "dOctets",
            Self::App => "app",
            Self::Class => "class",
            Self::DstAddrCount => "dstaddrcount",
            Self::SrcPortCount => "srcportcount",
            Self::DstPortUnique => "dstportunique",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "srcaddr" => Self::SrcAddr,
            "dstaddr" => Self::DstAddr,
            "srcport" => Self::SrcPort,
            "dstport" => Self::DstPort,
            "duration" => Self::Duration,
            "dPkts" => Self::Packets,
            "dOctets" => Self::Octets,
            "app" => Self::App,
            "class" => Self::Class,
            "dstaddrcount" => Self::DstAddrCount,
            "srcportcount" => Self::SrcPortCount,
            "dstportunique" => Self::DstPortUnique,
            _ => return None,
        };
        Some(field)
    }

    pub fn is_engineered(&self) -> bool {
        Self::ENGINEERED.contains(self)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Distinct-value counts for one source address, broadcast onto its flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressCounts {
    pub dstaddrcount: usize,
    pub srcportcount: usize,
    pub dstportunique: usize,
}

impl AddressCounts {
    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::DstAddrCount => Some(self.dstaddrcount),
            Field::SrcPortCount => Some(self.srcportcount),
            Field::DstPortUnique => Some(self.dstportunique),
            _ => None,
        }
    }
}

/// One network flow observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    /// Zero-based position in the file the record was loaded from.
    pub index: usize,
    pub srcaddr: String,
    pub dstaddr: String,
    pub srcport: u16,
    pub dstport: u16,
    pub duration: f64,
    pub packets: u64,
    pub octets: u64,
    pub app: Option<String>,
    pub class: Option<String>,
    pub counts: Option<AddressCounts>,
    /// Values of pass-through columns, aligned with [`Dataset::extra_columns`].
    pub extra: Vec<String>,
    /// Cell text of numeric input columns as read, where it differs from
    /// [`FlowRecord::text`].
    pub raw: HashMap<Field, String>,
}

impl FlowRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        srcaddr: &str,
        dstaddr: &str,
        srcport: u16,
        dstport: u16,
        duration: f64,
        packets: u64,
        octets: u64,
    ) -> Self {
        Self {
            index,
            srcaddr: srcaddr.to_string(),
            dstaddr: dstaddr.to_string(),
            srcport,
            dstport,
            duration,
            packets,
            octets,
            app: None,
            class: None,
            counts: None,
            extra: Vec::new(),
            raw: HashMap::new(),
        }
    }

    pub fn with_app(mut self, app: &str) -> Self {
        self.app = Some(app.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    /// Numeric value of a known column, if it has one.
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::SrcPort => Some(self.srcport as f64),
            Field::DstPort => Some(self.dstport as f64),
            Field::Duration => Some(self.duration),
            Field::Packets => Some(self.packets as f64),
            Field::Octets => Some(self.octets as f64),
            f if f.is_engineered() => self.counts.and_then(|c| c.get(f)).map(|v| v as f64),
            _ => None,
        }
    }

    /// Canonical text of a known column.
    pub fn text(&self, field: Field) -> String {
        match field {
            Field::SrcAddr => self.srcaddr.clone(),
            Field::DstAddr => self.dstaddr.clone(),
            Field::SrcPort => self.srcport.to_string(),
            Field::DstPort => self.dstport.to_string(),
            Field::Duration => self.duration.to_string(),
            Field::Packets => self.packets.to_string(),
            Field::Octets => self.octets.to_string(),
            Field::App => self.app.clone().unwrap_or_default(),
            Field::Class => self.class.clone().unwrap_or_default(),
            f => self
                .counts
                .and_then(|c| c.get(f))
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    /// Cell text written back to CSV: the input text while it still parses to
    /// the current value, the canonical formatting otherwise.
    pub fn cell(&self, field: Field) -> String {
        let current = self.numeric(field);
        match self.raw.get(&field) {
            Some(raw) if raw.parse::<f64>().ok() == current => raw.clone(),
            _ => self.text(field),
        }
    }
}

/// Where a column's value lives on a [`FlowRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Known(Field),
    Extra(usize),
}

/// Ordered collection of flow records sharing one header.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    header: Vec<String>,
    layout: Vec<Column>,
    extra_columns: Vec<String>,
    records: Vec<FlowRecord>,
}

impl Dataset {
    /// Builds a dataset with the canonical required header.
    pub fn from_records(name: &str, records: Vec<FlowRecord>) -> Self {
        let header: Vec<String> = Field::REQUIRED.iter().map(|f| f.name().to_string()).collect();
        let layout = Field::REQUIRED.iter().map(|f| Column::Known(*f)).collect();
        let mut dataset = Self {
            name: name.to_string(),
            header,
            layout,
            extra_columns: Vec::new(),
            records,
        };
        if dataset.records.iter().any(|r| r.app.is_some()) {
            dataset.append_column(Field::App);
        }
        if dataset.records.iter().any(|r| r.class.is_some()) {
            dataset.append_column(Field::Class);
        }
        if dataset.records.iter().any(|r| r.counts.is_some()) {
            for field in Field::ENGINEERED {
                dataset.append_column(field);
            }
        }
        dataset
    }

    /// Loads a comma-separated flow file with a header row.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read(&path.display().to_string(), file)
    }

    /// Reads a flow table from any reader.
    pub fn read<R: Read>(name: &str, reader: R) -> Result<Self, DatasetError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let has_counts = Field::ENGINEERED
            .iter()
            .all(|f| header.iter().any(|h| h == f.name()));

        let mut layout = Vec::with_capacity(header.len());
        let mut extra_columns = Vec::new();
        for name in &header {
            let known = Field::from_name(name)
                .filter(|f| !f.is_engineered() || has_counts)
                .filter(|f| !layout.contains(&Column::Known(*f)));
            match known {
                Some(field) => layout.push(Column::Known(field)),
                None => {
                    layout.push(Column::Extra(extra_columns.len()));
                    extra_columns.push(name.clone());
                }
            }
        }

        for field in Field::REQUIRED {
            if !layout.contains(&Column::Known(field)) {
                return Err(DatasetError::MissingColumn(field.name().to_string()));
            }
        }

        let mut records = Vec::new();
        for (index, row) in rdr.records().enumerate() {
            let row = row?;
            records.push(parse_row(index, &row, &layout, extra_columns.len(), has_counts)?);
        }

        if records.is_empty() {
            return Err(DatasetError::Empty(name.to_string()));
        }

        debug!(
            "Loaded {} flows from {} ({} pass-through columns)",
            records.len(),
            name,
            extra_columns.len()
        );

        Ok(Self {
            name: name.to_string(),
            header,
            layout,
            extra_columns,
            records,
        })
    }

    /// Writes the dataset to a CSV file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatasetError::Open {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(file)
    }

    /// Writes the header followed by every record.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.header)?;
        for record in &self.records {
            let row = self.layout.iter().map(|column| match column {
                Column::Known(field) => record.cell(*field),
                Column::Extra(i) => record.extra.get(*i).cloned().unwrap_or_default(),
            });
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Ensures a known column is part of the header, appending it if absent.
    pub fn append_column(&mut self, field: Field) {
        if !self.layout.contains(&Column::Known(field)) {
            self.header.push(field.name().to_string());
            self.layout.push(Column::Known(field));
        }
    }

    /// Resolves a column name to its location, for numeric feature lookup.
    pub fn column(&self, name: &str) -> Option<Column> {
        self.header
            .iter()
            .position(|h| h == name)
            .map(|i| self.layout[i])
    }

    /// Numeric value of `column` on `record`; `None` when empty or non-numeric.
    pub fn numeric(&self, record: &FlowRecord, column: Column) -> Option<f64> {
        match column {
            Column::Known(field) => record.numeric(field),
            Column::Extra(i) => record.extra.get(i).and_then(|v| v.parse().ok()),
        }
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.layout.contains(&Column::Known(field))
    }

    /// Keeps only records matching the predicate; returns the number dropped.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&FlowRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(keep);
        before - self.records.len()
    }

    /// Row counts per class label, in sorted class order.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if let Some(class) = &record.class {
                *counts.entry(class.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn records(&self) -> &[FlowRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [FlowRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_row(
    index: usize,
    row: &StringRecord,
    layout: &[Column],
    extra_width: usize,
    has_counts: bool,
) -> Result<FlowRecord, DatasetError> {
    let mut record = FlowRecord::new(index, "", "", 0, 0, 0.0, 0, 0);
    record.extra = vec![String::new(); extra_width];
    let mut counts = AddressCounts::default();

    for (column, value) in layout.iter().zip(row.iter()) {
        let field = match column {
            Column::Extra(i) => {
                record.extra[*i] = value.to_string();
                continue;
            }
            Column::Known(field) => *field,
        };
        match field {
            Field::SrcAddr => record.srcaddr = value.to_string(),
            Field::DstAddr => record.dstaddr = value.to_string(),
            Field::SrcPort => record.srcport = parse_value(index, field, value)?,
            Field::DstPort => record.dstport = parse_value(index, field, value)?,
            Field::Duration => record.duration = parse_value(index, field, value)?,
            Field::Packets => record.packets = parse_value(index, field, value)?,
            Field::Octets => record.octets = parse_value(index, field, value)?,
            Field::App => record.app = non_empty(value),
            Field::Class => record.class = non_empty(value),
            Field::DstAddrCount => counts.dstaddrcount = parse_value(index, field, value)?,
            Field::SrcPortCount => counts.srcportcount = parse_value(index, field, value)?,
            Field::DstPortUnique => counts.dstportunique = parse_value(index, field, value)?,
        }
        if Field::NUMERIC_INPUT.contains(&field) && record.text(field) != value {
            record.raw.insert(field, value.to_string());
        }
    }

    if has_counts {
        record.counts = Some(counts);
    }
    Ok(record)
}

fn parse_value<T: std::str::FromStr>(row: usize, field: Field, value: &str) -> Result<T, DatasetError> {
    value.parse().map_err(|_| DatasetError::InvalidValue {
        row,
        column: field.name().to_string(),
        value: value.to_string(),
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
