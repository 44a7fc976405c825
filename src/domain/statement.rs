//! Snaks, statements and claim sets.
//!
//! These mirror the Wikibase JSON document that Commons accepts for
//! structured data on files, so the field names (`mainsnak`, `qualifiers`,
//! `qualifiers-order`, `snaktype`, `datavalue`, `property`, `type`) must not
//! change.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Whether a snak carries a value, or asserts the absence/unknown-ness of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnakType {
    #[serde(rename = "value")]
    Value,

    #[serde(rename = "novalue")]
    NoValue,

    #[serde(rename = "somevalue")]
    SomeValue,
}

/// A reference to another entity in the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityId {
    #[serde(rename = "entity-type", default = "default_entity_type")]
    pub entity_type: String,

    #[serde(rename = "numeric-id", default, skip_serializing_if = "Option::is_none")]
    pub numeric_id: Option<u64>,

    pub id: String,
}

fn default_entity_type() -> String {
    "item".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonolingualText {
    pub text: String,
    pub language: String,
}

/// A point in time with an explicit precision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeValue {
    /// ISO 8601-ish Wikibase time string, e.g. `+2023-10-12T00:00:00Z`
    pub time: String,

    /// Wikibase precision code (9 = year, 10 = month, 11 = day)
    pub precision: u8,

    #[serde(default)]
    pub timezone: i32,

    #[serde(default)]
    pub before: i32,

    #[serde(default)]
    pub after: i32,

    pub calendarmodel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeCoordinate {
    pub latitude: f64,
    pub longitude: f64,

    /// Commons usually stores `null` here; treated as zero when compared
    #[serde(default)]
    pub altitude: Option<f64>,

    #[serde(default)]
    pub precision: Option<f64>,

    pub globe: String,
}

/// Typed datavalue, tagged the way Wikibase tags it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DataValue {
    #[serde(rename = "wikibase-entityid")]
    Entity(EntityId),

    #[serde(rename = "string")]
    String(String),

    #[serde(rename = "monolingualtext")]
    MonolingualText(MonolingualText),

    #[serde(rename = "time")]
    Time(TimeValue),

    #[serde(rename = "globecoordinate")]
    GlobeCoordinate(GlobeCoordinate),

    /// Never synthesized, but existing records may carry quantities
    #[serde(rename = "quantity")]
    Quantity(serde_json::Value),
}

impl DataValue {
    /// The string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// An atomic property/value assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    pub snaktype: SnakType,

    pub property: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datavalue: Option<DataValue>,

    /// Assigned by the store; absent on synthesized snaks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Snak {
    /// A snak asserting a concrete value
    pub fn value(property: impl Into<String>, datavalue: DataValue) -> Self {
        Self {
            snaktype: SnakType::Value,
            property: property.into(),
            datavalue: Some(datavalue),
            hash: None,
        }
    }

    /// A snak asserting that a value exists but is not a known entity
    pub fn some_value(property: impl Into<String>) -> Self {
        Self {
            snaktype: SnakType::SomeValue,
            property: property.into(),
            datavalue: None,
            hash: None,
        }
    }

    pub fn no_value(property: impl Into<String>) -> Self {
        Self {
            snaktype: SnakType::NoValue,
            property: property.into(),
            datavalue: None,
            hash: None,
        }
    }
}

/// One claim: a mainsnak plus qualifiers grouped by property.
///
/// `qualifiers_order` always lists exactly the properties present in
/// `qualifiers`, without duplicates, in the order they were first added.
/// The builder methods maintain that; the fields are private so nothing
/// else can break it, and deserialization rebuilds the order from the
/// qualifiers actually present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStatement")]
pub struct Statement {
    /// Present only for statements that already exist remotely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub mainsnak: Snak,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    qualifiers: BTreeMap<String, Vec<Snak>>,

    #[serde(
        rename = "qualifiers-order",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    qualifiers_order: Vec<String>,

    #[serde(rename = "type", default = "default_statement_type")]
    pub statement_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
}

fn default_statement_type() -> String {
    "statement".to_string()
}

/// A statement as it comes off the wire, before its qualifier order is checked
#[derive(Deserialize)]
struct RawStatement {
    #[serde(default)]
    id: Option<String>,

    mainsnak: Snak,

    #[serde(default)]
    qualifiers: BTreeMap<String, Vec<Snak>>,

    #[serde(rename = "qualifiers-order", default)]
    qualifiers_order: Vec<String>,

    #[serde(rename = "type", default = "default_statement_type")]
    statement_type: String,

    #[serde(default)]
    rank: Option<String>,
}

impl From<RawStatement> for Statement {
    /// Listed properties that have qualifiers keep their place; unlisted
    /// ones follow in property order.
    fn from(raw: RawStatement) -> Self {
        let qualifiers: BTreeMap<String, Vec<Snak>> = raw
            .qualifiers
            .into_iter()
            .filter(|(_, snaks)| !snaks.is_empty())
            .collect();

        let mut qualifiers_order: Vec<String> = Vec::with_capacity(qualifiers.len());
        for property in raw.qualifiers_order.into_iter().chain(qualifiers.keys().cloned()) {
            if qualifiers.contains_key(&property) && !qualifiers_order.contains(&property) {
                qualifiers_order.push(property);
            }
        }

        Self {
            id: raw.id,
            mainsnak: raw.mainsnak,
            qualifiers,
            qualifiers_order,
            statement_type: raw.statement_type,
            rank: raw.rank,
        }
    }
}

impl Statement {
    /// Create a statement with no qualifiers and no id
    pub fn new(mainsnak: Snak) -> Self {
        Self {
            id: None,
            mainsnak,
            qualifiers: BTreeMap::new(),
            qualifiers_order: Vec::new(),
            statement_type: default_statement_type(),
            rank: None,
        }
    }

    /// Builder form of [`Statement::push_qualifier`]
    pub fn with_qualifier(mut self, snak: Snak) -> Self {
        self.push_qualifier(snak);
        self
    }

    /// Tag this statement with a remote statement id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append a qualifier, recording its property in the order list on first sight
    pub fn push_qualifier(&mut self, snak: Snak) {
        if !self.qualifiers.contains_key(&snak.property) {
            self.qualifiers_order.push(snak.property.clone());
        }
        self.qualifiers
            .entry(snak.property.clone())
            .or_default()
            .push(snak);
    }

    /// Property of the mainsnak
    pub fn property(&self) -> &str {
        &self.mainsnak.property
    }

    pub fn has_qualifiers(&self) -> bool {
        self.qualifiers.values().any(|snaks| !snaks.is_empty())
    }

    pub fn qualifiers_order(&self) -> &[String] {
        &self.qualifiers_order
    }

    /// Qualifier snaks for one property
    pub fn qualifiers_for(&self, property: &str) -> &[Snak] {
        self.qualifiers
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All qualifier snaks, in qualifier order
    pub fn qualifier_snaks(&self) -> impl Iterator<Item = &Snak> {
        self.qualifiers_order
            .iter()
            .flat_map(move |property| self.qualifiers_for(property).iter())
    }
}

/// Statements synthesized for a photo, in display order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredClaims {
    pub claims: Vec<Statement>,
}

impl DesiredClaims {
    pub fn properties(&self) -> Vec<&str> {
        self.claims.iter().map(Statement::property).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }
}

/// Statements already attached to a remote record, keyed by property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExistingClaims(HashMap<String, Vec<Statement>>);

impl ExistingClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group statements by their mainsnak property
    pub fn from_statements(statements: impl IntoIterator<Item = Statement>) -> Self {
        let mut claims = Self::new();
        for statement in statements {
            claims.insert(statement);
        }
        claims
    }

    pub fn insert(&mut self, statement: Statement) {
        self.0
            .entry(statement.property().to_string())
            .or_default()
            .push(statement);
    }

    /// Statements for a property (empty if none)
    pub fn get(&self, property: &str) -> &[Statement] {
        self.0.get(property).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
