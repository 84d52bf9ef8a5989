//! Well-known text reader and writer for the geometry kinds a user can type
//! into the entry panel.

use std::fmt::Write as _;

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use thiserror::Error;

use crate::geometry::{Geometry, GeometryKind};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid WKT at byte {position}: {kind}")]
pub struct ParseError {
    pub position: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("geometry text is empty")]
    Empty,
    #[error("unsupported geometry keyword `{0}`")]
    UnsupportedKeyword(String),
    #[error("unsupported coordinate dimension `{0}`")]
    UnsupportedDimension(String),
    #[error("`{0}` is not a numeric ordinate")]
    InvalidOrdinate(String),
    #[error("unbalanced parentheses")]
    Unbalanced,
    #[error("expected {expected}, found `{found}`")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("{kind} needs at least {min} coordinates, found {found}")]
    TooFewCoordinates {
        kind: &'static str,
        min: usize,
        found: usize,
    },
    #[error("POINT EMPTY cannot be placed on a layer")]
    EmptyPoint,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Open,
    Close,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Word(w) | Self::Number(w) => w.clone(),
            Self::Open => "(".to_string(),
            Self::Close => ")".to_string(),
            Self::Comma => ",".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Vec<(usize, Token)> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((start, Token::Open));
            }
            ')' => {
                chars.next();
                tokens.push((start, Token::Close));
            }
            ',' => {
                chars.next();
                tokens.push((start, Token::Comma));
            }
            _ => {
                let mut lexeme = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | ',') {
                        break;
                    }
                    lexeme.push(c);
                    chars.next();
                }
                let numeric = lexeme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
                if numeric {
                    tokens.push((start, Token::Number(lexeme)));
                } else {
                    tokens.push((start, Token::Word(lexeme)));
                }
            }
        }
    }

    tokens
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            tokens: tokenize(text),
            cursor: 0,
            end: text.len(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map_or(self.end, |(pos, _)| *pos)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            position: self.position(),
            kind,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(_, t)| t.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expect_open(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some(Token::Open) => {
                self.cursor += 1;
                Ok(())
            }
            Some(other) => Err(self.error(ParseErrorKind::Expected {
                expected: "`(`",
                found: other.describe(),
            })),
            None => Err(self.error(ParseErrorKind::Unbalanced)),
        }
    }

    /// After a list item: `true` on `,` (more items follow), `false` on `)`.
    fn list_continues(&mut self) -> Result<bool, ParseError> {
        match self.peek() {
            Some(Token::Comma) => {
                self.cursor += 1;
                Ok(true)
            }
            Some(Token::Close) => {
                self.cursor += 1;
                Ok(false)
            }
            Some(other) => Err(self.error(ParseErrorKind::Expected {
                expected: "`,` or `)`",
                found: other.describe(),
            })),
            None => Err(self.error(ParseErrorKind::Unbalanced)),
        }
    }

    fn ordinate(&mut self) -> Result<f64, ParseError> {
        match self.peek() {
            Some(Token::Number(lexeme)) | Some(Token::Word(lexeme)) => {
                let lexeme = lexeme.clone();
                let value = lexeme
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| self.error(ParseErrorKind::InvalidOrdinate(lexeme)))?;
                self.cursor += 1;
                Ok(value)
            }
            Some(other) => Err(self.error(ParseErrorKind::Expected {
                expected: "an ordinate",
                found: other.describe(),
            })),
            None => Err(self.error(ParseErrorKind::Unbalanced)),
        }
    }

    fn coord(&mut self) -> Result<Coord<f64>, ParseError> {
        let x = self.ordinate()?;
        let y = self.ordinate()?;
        Ok(Coord { x, y })
    }

    /// `( x y, x y, ... )`
    fn coord_list(&mut self, kind: &'static str, min: usize) -> Result<Vec<Coord<f64>>, ParseError> {
        let start = self.position();
        self.expect_open()?;
        let mut coords = vec![self.coord()?];
        while self.list_continues()? {
            coords.push(self.coord()?);
        }
        if coords.len() < min {
            return Err(ParseError {
                position: start,
                kind: ParseErrorKind::TooFewCoordinates {
                    kind,
                    min,
                    found: coords.len(),
                },
            });
        }
        Ok(coords)
    }

    fn line(&mut self) -> Result<LineString<f64>, ParseError> {
        self.coord_list("LINESTRING", 2).map(LineString::new)
    }

    fn polygon(&mut self) -> Result<Polygon<f64>, ParseError> {
        self.expect_open()?;
        let exterior = LineString::new(self.coord_list("POLYGON ring", 3)?);
        let mut interiors = Vec::new();
        while self.list_continues()? {
            interiors.push(LineString::new(self.coord_list("POLYGON ring", 3)?));
        }
        Ok(Polygon::new(exterior, interiors))
    }

    fn multi_point(&mut self) -> Result<MultiPoint<f64>, ParseError> {
        self.expect_open()?;
        let mut points = Vec::new();
        loop {
            // Both `MULTIPOINT(1 2, 3 4)` and `MULTIPOINT((1 2), (3 4))` are in use.
            let coord = if matches!(self.peek(), Some(Token::Open)) {
                self.cursor += 1;
                let coord = self.coord()?;
                match self.next() {
                    Some(Token::Close) => coord,
                    Some(other) => {
                        self.cursor -= 1;
                        return Err(self.error(ParseErrorKind::Expected {
                            expected: "`)`",
                            found: other.describe(),
                        }));
                    }
                    None => return Err(self.error(ParseErrorKind::Unbalanced)),
                }
            } else {
                self.coord()?
            };
            points.push(Point::from(coord));
            if !self.list_continues()? {
                break;
            }
        }
        Ok(MultiPoint::new(points))
    }

    fn list_of<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.expect_open()?;
        let mut items = vec![item(self)?];
        while self.list_continues()? {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn keyword(&mut self) -> Result<GeometryKind, ParseError> {
        match self.peek() {
            Some(Token::Word(word)) => {
                let kind = GeometryKind::from_tag(word)
                    .filter(|kind| *kind != GeometryKind::Circle)
                    .ok_or_else(|| self.error(ParseErrorKind::UnsupportedKeyword(word.clone())))?;
                self.cursor += 1;
                Ok(kind)
            }
            Some(other) => Err(self.error(ParseErrorKind::UnsupportedKeyword(other.describe()))),
            None => Err(self.error(ParseErrorKind::Empty)),
        }
    }

    /// `true` if the body is the `EMPTY` marker.
    fn empty_marker(&mut self) -> Result<bool, ParseError> {
        if let Some(Token::Word(word)) = self.peek() {
            let upper = word.to_ascii_uppercase();
            if upper == "EMPTY" {
                self.cursor += 1;
                return Ok(true);
            }
            if matches!(upper.as_str(), "Z" | "M" | "ZM") {
                return Err(self.error(ParseErrorKind::UnsupportedDimension(word.clone())));
            }
        }
        Ok(false)
    }

    fn geometry(&mut self) -> Result<Geometry, ParseError> {
        let kind = self.keyword()?;
        if self.empty_marker()? {
            return match kind {
                GeometryKind::Point => Err(self.error(ParseErrorKind::EmptyPoint)),
                GeometryKind::LineString => Ok(Geometry::LineString(LineString::new(Vec::new()))),
                GeometryKind::Polygon => Ok(Geometry::Polygon(Polygon::new(
                    LineString::new(Vec::new()),
                    Vec::new(),
                ))),
                GeometryKind::MultiPoint => Ok(Geometry::MultiPoint(MultiPoint::new(Vec::new()))),
                GeometryKind::MultiLineString => {
                    Ok(Geometry::MultiLineString(MultiLineString::new(Vec::new())))
                }
                GeometryKind::MultiPolygon | GeometryKind::Circle => {
                    Ok(Geometry::MultiPolygon(MultiPolygon::new(Vec::new())))
                }
            };
        }

        let geometry = match kind {
            GeometryKind::Point => {
                let coords = self.coord_list("POINT", 1)?;
                if coords.len() > 1 {
                    return Err(self.error(ParseErrorKind::Expected {
                        expected: "a single coordinate",
                        found: format!("{} coordinates", coords.len()),
                    }));
                }
                Geometry::Point(Point::from(coords[0]))
            }
            GeometryKind::LineString => Geometry::LineString(self.line()?),
            GeometryKind::Polygon => Geometry::Polygon(self.polygon()?),
            GeometryKind::MultiPoint => Geometry::MultiPoint(self.multi_point()?),
            GeometryKind::MultiLineString => {
                Geometry::MultiLineString(MultiLineString::new(self.list_of(Self::line)?))
            }
            GeometryKind::MultiPolygon | GeometryKind::Circle => {
                Geometry::MultiPolygon(MultiPolygon::new(self.list_of(Self::polygon)?))
            }
        };
        Ok(geometry)
    }
}

/// Parses a single WKT geometry. Keywords are case-insensitive and an
/// optional space between keyword and `(` is accepted.
pub fn parse(text: &str) -> Result<Geometry, ParseError> {
    let mut parser = Parser::new(text);
    let geometry = parser.geometry()?;
    match parser.peek() {
        None => Ok(geometry),
        Some(Token::Close) => Err(parser.error(ParseErrorKind::Unbalanced)),
        Some(other) => Err(parser.error(ParseErrorKind::Expected {
            expected: "end of input",
            found: other.describe(),
        })),
    }
}

/// Writes `geometry` as WKT. Circles have no WKT form and yield `None`.
pub fn format(geometry: &Geometry) -> Option<String> {
    let mut out = String::new();
    out.push_str(geometry.kind().tag());
    match geometry {
        Geometry::Point(p) => {
            out.push('(');
            push_coord(&mut out, p.0);
            out.push(')');
        }
        Geometry::LineString(ls) => push_path_or_empty(&mut out, ls.0.as_slice()),
        Geometry::Polygon(poly) => {
            if poly.exterior().0.is_empty() {
                out.push_str(" EMPTY");
            } else {
                push_polygon(&mut out, poly);
            }
        }
        Geometry::MultiPoint(mp) => {
            let coords: Vec<Coord<f64>> = mp.iter().map(|p| p.0).collect();
            push_path_or_empty(&mut out, &coords);
        }
        Geometry::MultiLineString(mls) => {
            if mls.0.is_empty() {
                out.push_str(" EMPTY");
            } else {
                out.push('(');
                for (i, ls) in mls.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    push_path(&mut out, ls.0.as_slice());
                }
                out.push(')');
            }
        }
        Geometry::MultiPolygon(mpoly) => {
            if mpoly.0.is_empty() {
                out.push_str(" EMPTY");
            } else {
                out.push('(');
                for (i, poly) in mpoly.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    push_polygon(&mut out, poly);
                }
                out.push(')');
            }
        }
        Geometry::Circle(_) => return None,
    }
    Some(out)
}

fn push_coord(out: &mut String, c: Coord<f64>) {
    let _ = write!(out, "{} {}", c.x, c.y);
}

fn push_path(out: &mut String, coords: &[Coord<f64>]) {
    out.push('(');
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_coord(out, *c);
    }
    out.push(')');
}

fn push_path_or_empty(out: &mut String, coords: &[Coord<f64>]) {
    if coords.is_empty() {
        out.push_str(" EMPTY");
    } else {
        push_path(out, coords);
    }
}

fn push_polygon(out: &mut String, poly: &Polygon<f64>) {
    out.push('(');
    push_path(out, poly.exterior().0.as_slice());
    for ring in poly.interiors() {
        out.push_str(", ");
        push_path(out, ring.0.as_slice());
    }
    out.push(')');
}
