//! CSS parser and stylesheet representation using cssparser
//!
//! Parsing is tolerant: a rule whose selector cannot be understood is
//! dropped on its own, and a malformed declaration is dropped without
//! affecting its siblings. At-rules are skipped entirely.

use cssparser::{
    BasicParseError, BasicParseErrorKind, Delimiter, ParseError, Parser, ParserInput, Token,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::dom::Attributes;

/// CSS value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Keyword (e.g., "auto", "none")
    Keyword(String),
    /// Quoted string
    String(String),
    /// Length with unit (e.g., 10px)
    Length(f32, Unit),
    /// Color value
    Color(Color),
    /// Percentage
    Percentage(f32),
    /// Number without unit
    Number(f32),
    /// Space or comma separated values (e.g., `1px solid red`)
    List(Vec<Value>),
}

impl Value {
    /// First color found in this value, looking inside lists
    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            Value::List(values) => values.iter().find_map(Value::as_color),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

/// CSS length units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Px,
    Em,
    Rem,
    Percent,
    Vh,
    Vw,
    Pt,
    Cm,
    Mm,
    In,
}

impl Unit {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "px" => Some(Unit::Px),
            "em" => Some(Unit::Em),
            "rem" => Some(Unit::Rem),
            "%" => Some(Unit::Percent),
            "vh" => Some(Unit::Vh),
            "vw" => Some(Unit::Vw),
            "pt" => Some(Unit::Pt),
            "cm" => Some(Unit::Cm),
            "mm" => Some(Unit::Mm),
            "in" => Some(Unit::In),
            _ => None,
        }
    }
}

/// CSS color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse a hex color string
    fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let short = |i: usize| u8::from_str_radix(&hex[i..i + 1].repeat(2), 16).ok();
        let long = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => Some(Color::rgb(short(0)?, short(1)?, short(2)?)),
            4 => Some(Color::rgba(short(0)?, short(1)?, short(2)?, short(3)?)),
            6 => Some(Color::rgb(long(0)?, long(2)?, long(4)?)),
            8 => Some(Color::rgba(long(0)?, long(2)?, long(4)?, long(6)?)),
            _ => None,
        }
    }

    /// Parse named colors
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "black" => Some(Color::rgb(0, 0, 0)),
            "white" => Some(Color::rgb(255, 255, 255)),
            "red" => Some(Color::rgb(255, 0, 0)),
            "green" => Some(Color::rgb(0, 128, 0)),
            "lime" => Some(Color::rgb(0, 255, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "navy" => Some(Color::rgb(0, 0, 128)),
            "yellow" => Some(Color::rgb(255, 255, 0)),
            "cyan" | "aqua" => Some(Color::rgb(0, 255, 255)),
            "magenta" | "fuchsia" => Some(Color::rgb(255, 0, 255)),
            "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
            "silver" => Some(Color::rgb(192, 192, 192)),
            "maroon" => Some(Color::rgb(128, 0, 0)),
            "olive" => Some(Color::rgb(128, 128, 0)),
            "teal" => Some(Color::rgb(0, 128, 128)),
            "orange" => Some(Color::rgb(255, 165, 0)),
            "purple" => Some(Color::rgb(128, 0, 128)),
            "pink" => Some(Color::rgb(255, 192, 203)),
            "transparent" => Some(Color::TRANSPARENT),
            _ => None,
        }
    }
}

/// Specificity as (ids, classes, tags); compared lexicographically
pub type Specificity = (u32, u32, u32);

/// Compound selector: optional tag, optional id, any number of classes
///
/// A selector with none of them set is the universal selector `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub tag_name: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Selector {
    /// Calculate specificity (a, b, c)
    pub fn specificity(&self) -> Specificity {
        let a = u32::from(self.id.is_some());
        let b = self.classes.len() as u32;
        let c = u32::from(self.tag_name.is_some());
        (a, b, c)
    }

    /// Check this selector against a node's attributes
    pub fn matches(&self, attributes: &Attributes) -> bool {
        if let Some(tag) = &self.tag_name {
            if !attributes.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if attributes.id() != Some(id.as_str()) {
                return false;
            }
        }

        self.classes
            .iter()
            .all(|class| attributes.classes().any(|c| c == class))
    }
}

/// CSS declaration (property: value)
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: Value,
}

/// CSS rule (selector list + declarations)
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

impl Rule {
    /// Highest specificity among the selectors that match, if any does
    pub fn match_specificity(&self, attributes: &Attributes) -> Option<Specificity> {
        self.selectors
            .iter()
            .filter(|s| s.matches(attributes))
            .map(Selector::specificity)
            .max()
    }
}

/// CSS stylesheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    /// Rules dropped because they could not be parsed
    pub skipped: usize,
}

/// Owned selector tokens collected from a rule prelude
#[derive(Debug, Clone, PartialEq)]
enum SelectorPart {
    Ident(String),
    Id(String),
    Dot,
    Star,
    Comma,
    Space,
    Unsupported(String),
}

/// CSS parser using cssparser crate
pub struct CssParser {}

impl CssParser {
    pub fn new() -> Self {
        Self {}
    }

    /// Parse CSS content into a stylesheet, skipping rules that fail
    pub fn parse(&self, content: &str) -> Stylesheet {
        let mut input = ParserInput::new(content);
        let mut parser = Parser::new(&mut input);
        let mut stylesheet = Stylesheet::default();

        while !parser.is_exhausted() {
            let start = parser.state();
            if let Ok(Token::AtKeyword(name)) = parser.next() {
                debug!("skipping @{} rule", name);
                self.skip_at_rule(&mut parser);
                continue;
            }
            parser.reset(&start);

            match self.parse_rule(&mut parser) {
                Ok(rule) => stylesheet.rules.push(rule),
                Err(err) => {
                    debug!("skipping unparseable CSS rule: {:?}", err.kind);
                    stylesheet.skipped += 1;
                }
            }
        }

        stylesheet
    }

    /// Parse a single CSS rule
    fn parse_rule<'i>(&self, parser: &mut Parser<'i, '_>) -> Result<Rule, ParseError<'i, ()>> {
        let mut prelude = Vec::new();

        loop {
            match parser.next_including_whitespace() {
                Ok(Token::CurlyBracketBlock) => break,
                Ok(token) => prelude.push(Self::selector_part(token)),
                Err(err) => return Err(err.into()),
            }
        }

        let declarations = parser.parse_nested_block(|p| self.parse_declarations(p))?;
        match Self::build_selectors(&prelude) {
            Some(selectors) => Ok(Rule {
                selectors,
                declarations,
            }),
            None => Err(parser.new_error(BasicParseErrorKind::QualifiedRuleInvalid)),
        }
    }

    fn selector_part(token: &Token) -> SelectorPart {
        match token {
            Token::Ident(s) => SelectorPart::Ident(s.to_string()),
            Token::IDHash(s) => SelectorPart::Id(s.to_string()),
            Token::Delim('.') => SelectorPart::Dot,
            Token::Delim('*') => SelectorPart::Star,
            Token::Comma => SelectorPart::Comma,
            Token::WhiteSpace(_) => SelectorPart::Space,
            other => SelectorPart::Unsupported(format!("{:?}", other)),
        }
    }

    /// Turn prelude tokens into a selector list
    ///
    /// Combinators, pseudo-classes and attribute selectors are not supported;
    /// any of them invalidates the whole list.
    fn build_selectors(parts: &[SelectorPart]) -> Option<Vec<Selector>> {
        parts
            .split(|p| *p == SelectorPart::Comma)
            .map(|group| {
                let start = group.iter().position(|p| *p != SelectorPart::Space)?;
                let end = group.iter().rposition(|p| *p != SelectorPart::Space)?;
                Self::build_compound(&group[start..=end])
            })
            .collect()
    }

    fn build_compound(parts: &[SelectorPart]) -> Option<Selector> {
        let mut selector = Selector::default();
        let mut iter = parts.iter().enumerate();

        while let Some((index, part)) = iter.next() {
            match part {
                SelectorPart::Ident(name) if index == 0 => {
                    selector.tag_name = Some(name.to_ascii_lowercase());
                }
                SelectorPart::Star if index == 0 => {}
                SelectorPart::Id(id) if selector.id.is_none() => {
                    selector.id = Some(id.clone());
                }
                SelectorPart::Dot => match iter.next() {
                    Some((_, SelectorPart::Ident(class))) => selector.classes.push(class.clone()),
                    _ => return None,
                },
                _ => return None,
            }
        }

        Some(selector)
    }

    /// Parse declarations inside a rule block
    fn parse_declarations<'i>(
        &self,
        parser: &mut Parser<'i, '_>,
    ) -> Result<Vec<Declaration>, ParseError<'i, ()>> {
        let mut declarations = Vec::new();

        while !parser.is_exhausted() {
            let result =
                parser.parse_until_after(Delimiter::Semicolon, |p| self.parse_declaration(p));
            match result {
                Ok(decl) => declarations.push(decl),
                Err(err) => debug!("dropping malformed declaration: {:?}", err.kind),
            }
        }

        Ok(declarations)
    }

    /// Parse one `property: value [!important]` declaration
    fn parse_declaration<'i>(
        &self,
        parser: &mut Parser<'i, '_>,
    ) -> Result<Declaration, ParseError<'i, ()>> {
        let property = parser.expect_ident()?.to_ascii_lowercase();
        parser.expect_colon()?;

        let mut values = Vec::new();
        while !parser.is_exhausted() {
            let important = parser
                .try_parse(|p| -> Result<(), BasicParseError<'i>> {
                    p.expect_delim('!')?;
                    p.expect_ident_matching("important")?;
                    Ok(())
                })
                .is_ok();
            if important {
                continue;
            }
            if parser.try_parse(|p| p.expect_comma()).is_ok() {
                continue;
            }
            values.push(self.parse_value(parser)?);
        }

        let value = match values.len() {
            0 => return Err(parser.new_error(BasicParseErrorKind::EndOfInput)),
            1 => values.remove(0),
            _ => Value::List(values),
        };

        Ok(Declaration { property, value })
    }

    /// Parse a CSS value
    fn parse_value<'i>(&self, parser: &mut Parser<'i, '_>) -> Result<Value, ParseError<'i, ()>> {
        let token = parser.next()?.clone();
        match token {
            Token::Number { value, .. } => Ok(Value::Number(value)),
            Token::Percentage { unit_value, .. } => Ok(Value::Percentage(unit_value * 100.0)),
            Token::Dimension { value, unit, .. } => match Unit::from_str(&unit) {
                Some(u) => Ok(Value::Length(value, u)),
                None => Ok(Value::Keyword(format!("{}{}", value, unit))),
            },
            Token::Ident(name) => match Color::from_name(&name) {
                Some(color) => Ok(Value::Color(color)),
                None => Ok(Value::Keyword(name.to_ascii_lowercase())),
            },
            Token::QuotedString(s) => Ok(Value::String(s.to_string())),
            Token::IDHash(hash) | Token::Hash(hash) => match Color::from_hex(&hash) {
                Some(color) => Ok(Value::Color(color)),
                None => Err(parser.new_error(BasicParseErrorKind::UnexpectedToken(
                    Token::Hash(hash),
                ))),
            },
            Token::Function(name) => {
                let name = name.to_ascii_lowercase();
                match name.as_str() {
                    "rgb" | "rgba" => {
                        parser.parse_nested_block(|p| self.parse_rgb_function(p))
                    }
                    _ => parser.parse_nested_block(|p| {
                        while p.next().is_ok() {}
                        Ok(Value::Keyword(name.clone()))
                    }),
                }
            }
            _ => Err(parser.new_error(BasicParseErrorKind::UnexpectedToken(token))),
        }
    }

    /// Parse rgb() or rgba() function; alpha is optional in both
    fn parse_rgb_function<'i>(
        &self,
        parser: &mut Parser<'i, '_>,
    ) -> Result<Value, ParseError<'i, ()>> {
        let r = self.parse_color_component(parser)?;
        let _ = parser.try_parse(|p| p.expect_comma());
        let g = self.parse_color_component(parser)?;
        let _ = parser.try_parse(|p| p.expect_comma());
        let b = self.parse_color_component(parser)?;

        let a = if !parser.is_exhausted() {
            let _ = parser.try_parse(|p| -> Result<(), BasicParseError<'i>> {
                match p.next()? {
                    Token::Comma => Ok(()),
                    Token::Delim('/') => Ok(()),
                    t => {
                        let t = t.clone();
                        Err(p.new_basic_error(BasicParseErrorKind::UnexpectedToken(t)))
                    }
                }
            });
            self.parse_alpha_component(parser)?
        } else {
            255
        };

        Ok(Value::Color(Color::rgba(r, g, b, a)))
    }

    /// Parse a color component (0-255 or percentage)
    fn parse_color_component<'i>(
        &self,
        parser: &mut Parser<'i, '_>,
    ) -> Result<u8, ParseError<'i, ()>> {
        let token = parser.next()?.clone();
        match token {
            Token::Number { value, .. } => Ok(value.clamp(0.0, 255.0) as u8),
            Token::Percentage { unit_value, .. } => {
                Ok((unit_value * 255.0).clamp(0.0, 255.0) as u8)
            }
            _ => Err(parser.new_error(BasicParseErrorKind::UnexpectedToken(token))),
        }
    }

    /// Parse alpha component (0-1 or percentage)
    fn parse_alpha_component<'i>(
        &self,
        parser: &mut Parser<'i, '_>,
    ) -> Result<u8, ParseError<'i, ()>> {
        let token = parser.next()?.clone();
        match token {
            Token::Number { value, .. } => Ok((value.clamp(0.0, 1.0) * 255.0).round() as u8),
            Token::Percentage { unit_value, .. } => {
                Ok((unit_value * 255.0).clamp(0.0, 255.0).round() as u8)
            }
            _ => Err(parser.new_error(BasicParseErrorKind::UnexpectedToken(token))),
        }
    }

    /// Skip an at-rule up to its terminating semicolon or block
    fn skip_at_rule(&self, parser: &mut Parser<'_, '_>) {
        loop {
            match parser.next() {
                Ok(Token::Semicolon) | Ok(Token::CurlyBracketBlock) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    }
}

impl Default for CssParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(css: &str) -> Stylesheet {
        CssParser::new().parse(css)
    }

    #[test]
    fn test_parse_simple_rule() {
        let stylesheet = parse("body { color: red; }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.rules[0].selectors[0].tag_name, Some("body".to_string()));
        assert_eq!(stylesheet.rules[0].declarations.len(), 1);
        assert_eq!(stylesheet.rules[0].declarations[0].property, "color");
        assert_eq!(
            stylesheet.rules[0].declarations[0].value,
            Value::Color(Color::rgb(255, 0, 0))
        );
    }

    #[test]
    fn test_parse_hex_color() {
        let stylesheet = parse("div { background: #ff0000; border-color: #0f08 }");

        assert_eq!(stylesheet.rules.len(), 1);
        let decls = &stylesheet.rules[0].declarations;
        assert_eq!(decls[0].value, Value::Color(Color::rgb(255, 0, 0)));
        assert_eq!(decls[1].value, Value::Color(Color::rgba(0, 255, 0, 136)));
    }

    #[test]
    fn test_parse_length() {
        let stylesheet = parse("p { margin: 10px; }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(
            stylesheet.rules[0].declarations[0].value,
            Value::Length(10.0, Unit::Px)
        );
    }

    #[test]
    fn test_parse_class_selector() {
        let stylesheet = parse(".blue-bg { background-color: blue; }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.rules[0].selectors[0].classes, vec!["blue-bg".to_string()]);
    }

    #[test]
    fn test_parse_id_selector() {
        let stylesheet = parse("#main { height: 50vh; }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.rules[0].selectors[0].id, Some("main".to_string()));
    }

    #[test]
    fn test_parse_compound_and_list() {
        let stylesheet = parse("div.a.b#x, * { color: blue }");
        let selectors = &stylesheet.rules[0].selectors;

        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[0].specificity(), (1, 2, 1));
        assert_eq!(selectors[1], Selector::default());
        assert_eq!(selectors[1].specificity(), (0, 0, 0));
    }

    #[test]
    fn test_parse_multiple_declarations() {
        let stylesheet = parse("div { color: blue; font-size: 16px; margin: 10px; }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.rules[0].declarations.len(), 3);
    }

    #[test]
    fn test_parse_rgb_color() {
        let stylesheet = parse("span { color: rgb(128, 64, 32); outline-color: rgba(0,0,0,0.5) }");
        let decls = &stylesheet.rules[0].declarations;

        assert_eq!(decls[0].value, Value::Color(Color::rgb(128, 64, 32)));
        assert_eq!(decls[1].value, Value::Color(Color::rgba(0, 0, 0, 128)));
    }

    #[test]
    fn test_multi_token_value() {
        let stylesheet = parse(".box { border: 1px solid red !important; }");
        let value = &stylesheet.rules[0].declarations[0].value;

        assert_eq!(
            *value,
            Value::List(vec![
                Value::Length(1.0, Unit::Px),
                Value::Keyword("solid".into()),
                Value::Color(Color::rgb(255, 0, 0)),
            ])
        );
        assert_eq!(value.as_color(), Some(Color::rgb(255, 0, 0)));
    }

    #[test]
    fn test_bad_rule_is_skipped_alone() {
        let stylesheet = parse("div > p { color: red } .ok { color: blue } a:hover { color: green }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.skipped, 2);
        assert_eq!(stylesheet.rules[0].selectors[0].classes, vec!["ok".to_string()]);
    }

    #[test]
    fn test_descendant_selector_is_unsupported() {
        let stylesheet = parse(".a .b { color: red }");
        assert!(stylesheet.rules.is_empty());
        assert_eq!(stylesheet.skipped, 1);
    }

    #[test]
    fn test_bad_declaration_is_dropped_alone() {
        let stylesheet = parse(".a { color: ; width: 10px; : nope; height: 5px }");
        let props: Vec<_> = stylesheet.rules[0]
            .declarations
            .iter()
            .map(|d| d.property.as_str())
            .collect();

        assert_eq!(props, vec!["width", "height"]);
    }

    #[test]
    fn test_at_rules_are_skipped() {
        let stylesheet = parse("@import \"x.css\"; @media screen { .a { color: red } } .b { color: blue }");

        assert_eq!(stylesheet.rules.len(), 1);
        assert_eq!(stylesheet.rules[0].selectors[0].classes, vec!["b".to_string()]);
    }

    #[test]
    fn test_unterminated_rule() {
        let stylesheet = parse(".a { color: red");
        assert_eq!(stylesheet.rules.len(), 1);

        let stylesheet = parse(".a");
        assert!(stylesheet.rules.is_empty());
        assert_eq!(stylesheet.skipped, 1);
    }

    #[test]
    fn test_selector_matching() {
        let mut attrs = Attributes::new();
        attrs.set("class", "blue-bg large");
        attrs.set("tag", "DIV");
        attrs.set("id", "main");

        let rule = &parse("div.large#main { color: red }").rules[0];
        assert!(rule.selectors[0].matches(&attrs));

        let rule = &parse(".missing { color: red }").rules[0];
        assert!(!rule.selectors[0].matches(&attrs));
        assert_eq!(rule.match_specificity(&attrs), None);
    }
}
