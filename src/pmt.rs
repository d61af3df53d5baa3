use crate::hit::TubeId;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use winnow::ascii::{float, newline, space0, space1};
use winnow::combinator::{opt, separated, terminated};
use winnow::error::ContextError;
use winnow::token::take_till;
use winnow::Parser;

/// Static properties of a PMT model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmtType {
    pub name: String,
    /// Photocathode radius (mm).
    pub radius: f64,
    /// Transit-time jitter constant used by the timing resolution (ns).
    pub time_constant: f64,
}

/// Set of [`PmtType`]s, keyed by name.
///
/// The text form has one type per line: `<name> <radius> <time_constant>`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PmtTable {
    inner: BTreeMap<String, PmtType>,
}

impl PmtTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds a PMT type. Returns the previous definition with the same name.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::pmt::{PmtTable, PmtType};
    ///
    /// let mut table = PmtTable::new();
    /// let r6091 = PmtType {
    ///     name: "R6091".into(),
    ///     radius: 38.0,
    ///     time_constant: 2.0,
    /// };
    ///
    /// assert_eq!(table.insert(r6091.clone()), None);
    /// assert_eq!(table.insert(r6091.clone()), Some(r6091));
    /// ```
    pub fn insert(&mut self, pmt_type: PmtType) -> Option<PmtType> {
        self.inner.insert(pmt_type.name.clone(), pmt_type)
    }
    pub fn get(&self, name: &str) -> Option<&PmtType> {
        self.inner.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &PmtType> {
        self.inner.values()
    }
}

impl FromIterator<PmtType> for PmtTable {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = PmtType>,
    {
        let mut table = Self::new();
        for pmt_type in iter {
            table.insert(pmt_type);
        }

        table
    }
}

impl<const N: usize> From<[PmtType; N]> for PmtTable {
    /// Converts a `[PmtType; N]` into a `PmtTable`. Later entries replace
    /// earlier entries with the same name.
    fn from(arr: [PmtType; N]) -> Self {
        Self::from_iter(arr)
    }
}

impl fmt::Display for PmtTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .inner
            .values()
            .map(|t| format!("{} {} {}", t.name, t.radius, t.time_constant))
            .collect::<Vec<_>>()
            .join("\n");

        write!(f, "{text}")
    }
}

fn parse_line(input: &mut &str) -> winnow::Result<PmtType> {
    (
        take_till(1.., |c: char| c.is_ascii_whitespace()),
        space1,
        float,
        space1,
        float,
        space0,
    )
        .map(
            |(name, _, radius, _, time_constant, _): (&str, &str, f64, &str, f64, &str)| PmtType {
                name: name.to_string(),
                radius,
                time_constant,
            },
        )
        .parse_next(input)
}

/// The error type returned when parsing a [`PmtTable`] fails.
#[derive(Debug)]
pub struct ParseError {
    input: String,
    span: std::ops::Range<usize>,
}

impl ParseError {
    fn from_parse(error: winnow::error::ParseError<&str, ContextError>) -> Self {
        let input = error.input().to_string();
        let span = error.char_span();
        Self { input, span }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = annotate_snippets::Level::Error
            .title("invalid PMT type definition")
            .snippet(
                annotate_snippets::Snippet::source(&self.input)
                    .fold(true)
                    .annotation(
                        annotate_snippets::Level::Error
                            .span(self.span.clone())
                            .label("expected `<name> <radius> <time_constant>`"),
                    ),
            );
        let renderer = annotate_snippets::Renderer::plain();
        let rendered = renderer.render(message);
        rendered.fmt(f)
    }
}

impl std::error::Error for ParseError {}

impl std::str::FromStr for PmtTable {
    type Err = ParseError;

    /// Parse a [`PmtTable`] from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use wcdigi::pmt::PmtTable;
    ///
    /// let table = PmtTable::from_str("R6091 38.0 2.0\n88mm 44 1.5\n")?;
    ///
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.get("88mm").unwrap().time_constant, 1.5);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let types: Vec<PmtType> = terminated(separated(0.., parse_line, newline), opt(newline))
            .parse(input)
            .map_err(ParseError::from_parse)?;

        Ok(Self::from_iter(types))
    }
}

/// Detector region a tube is mounted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Top,
    Barrel,
    Bottom,
    /// Outer veto detector. Excluded from the global trigger.
    Veto,
}

impl Region {
    pub fn is_veto(self) -> bool {
        self == Region::Veto
    }
}

/// A PMT placed in the detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tube {
    pub pmt_name: String,
    pub region: Region,
}

/// Static description of the instrumented detector: which PMT type sits at
/// each tube, and where.
#[derive(Clone, Debug, Default)]
pub struct Detector {
    pmt_types: PmtTable,
    tubes: BTreeMap<TubeId, Tube>,
}

impl Detector {
    pub fn new(pmt_types: PmtTable) -> Self {
        Self {
            pmt_types,
            tubes: BTreeMap::new(),
        }
    }

    /// Places a tube. The PMT type must already be defined and the tube ID
    /// must be unused.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use wcdigi::pmt::{Detector, PmtTable, Region};
    ///
    /// let mut detector = Detector::new(PmtTable::from_str("R6091 38 2")?);
    /// detector.add_tube(1, "R6091", Region::Barrel)?;
    ///
    /// assert!(detector.add_tube(1, "R6091", Region::Top).is_err());
    /// assert!(detector.add_tube(2, "R7081", Region::Top).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn add_tube(
        &mut self,
        tube_id: TubeId,
        pmt_name: &str,
        region: Region,
    ) -> Result<(), Error> {
        if !self.pmt_types.contains(pmt_name) {
            return Err(Error::UnknownPmtType(pmt_name.to_string()));
        }
        if self.tubes.contains_key(&tube_id) {
            return Err(Error::DuplicateTube(tube_id));
        }
        self.tubes.insert(
            tube_id,
            Tube {
                pmt_name: pmt_name.to_string(),
                region,
            },
        );

        Ok(())
    }

    pub fn tube(&self, tube_id: TubeId) -> Result<&Tube, Error> {
        self.tubes.get(&tube_id).ok_or(Error::UnknownTube(tube_id))
    }
    pub fn pmt_type(&self, name: &str) -> Result<&PmtType, Error> {
        self.pmt_types
            .get(name)
            .ok_or_else(|| Error::UnknownPmtType(name.to_string()))
    }
    pub fn pmt_types(&self) -> &PmtTable {
        &self.pmt_types
    }
    pub fn tubes(&self) -> impl Iterator<Item = (TubeId, &Tube)> {
        self.tubes.iter().map(|(&id, tube)| (id, tube))
    }
    pub fn num_tubes(&self) -> usize {
        self.tubes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn pmt(name: &str, radius: f64, time_constant: f64) -> PmtType {
        PmtType {
            name: name.to_string(),
            radius,
            time_constant,
        }
    }

    #[test]
    fn pmt_table_insert_replaces() {
        let mut table = PmtTable::new();

        assert!(table.insert(pmt("R6091", 38.0, 2.0)).is_none());
        assert_eq!(
            table.insert(pmt("R6091", 38.0, 3.0)),
            Some(pmt("R6091", 38.0, 2.0))
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("R6091").unwrap().time_constant, 3.0);
    }

    #[test]
    fn pmt_table_to_string() {
        let mut table = PmtTable::new();
        assert_eq!(table.to_string(), "");

        table.insert(pmt("R6091", 38.0, 2.0));
        assert_eq!(table.to_string(), "R6091 38 2");

        table.insert(pmt("88mm", 44.5, 1.5));
        assert_eq!(table.to_string(), "88mm 44.5 1.5\nR6091 38 2");
    }

    #[test]
    fn pmt_table_from_str() {
        let mut string = String::new();
        let mut table = PmtTable::new();
        assert_eq!(table, PmtTable::from_str(&string).unwrap());

        string.push_str("R6091 38.0 2.0");
        table.insert(pmt("R6091", 38.0, 2.0));
        assert_eq!(table, PmtTable::from_str(&string).unwrap());

        string.push_str("\n88mm\t44.5   1.5  \n");
        table.insert(pmt("88mm", 44.5, 1.5));
        assert_eq!(table, PmtTable::from_str(&string).unwrap());

        assert_eq!(table, PmtTable::from_str(&table.to_string()).unwrap());
    }

    #[test]
    fn pmt_table_from_str_invalid() {
        assert!(PmtTable::from_str("R6091 38.0").is_err());
        assert!(PmtTable::from_str("R6091 radius 2.0").is_err());
        assert!(PmtTable::from_str("R6091 38 2\n\nR7081 127 3").is_err());

        let err = PmtTable::from_str("R6091 38.0 2.0\nR7081 x 3").unwrap_err();
        assert!(err.to_string().contains("invalid PMT type definition"));
    }

    #[test]
    fn detector_lookups() {
        let table = PmtTable::from([pmt("R6091", 38.0, 2.0)]);
        let mut detector = Detector::new(table);
        detector.add_tube(1, "R6091", Region::Barrel).unwrap();
        detector.add_tube(2, "R6091", Region::Veto).unwrap();

        assert_eq!(detector.num_tubes(), 2);
        assert!(!detector.tube(1).unwrap().region.is_veto());
        assert!(detector.tube(2).unwrap().region.is_veto());
        assert!(matches!(detector.tube(3), Err(Error::UnknownTube(3))));
        assert_eq!(detector.pmt_type("R6091").unwrap().radius, 38.0);
        assert!(matches!(
            detector.pmt_type("R7081"),
            Err(Error::UnknownPmtType(_))
        ));
    }

    #[test]
    fn detector_rejects_bad_tubes() {
        let mut detector = Detector::new(PmtTable::from([pmt("R6091", 38.0, 2.0)]));

        assert!(matches!(
            detector.add_tube(1, "88mm", Region::Top),
            Err(Error::UnknownPmtType(_))
        ));
        detector.add_tube(1, "R6091", Region::Top).unwrap();
        assert!(matches!(
            detector.add_tube(1, "R6091", Region::Top),
            Err(Error::DuplicateTube(1))
        ));
    }
}
