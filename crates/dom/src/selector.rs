//! Structural selectors
//!
//! The subset of CSS selectors the cleaner rules are written in:
//!
//! ```text
//! list      := complex ( "," complex )*
//! complex   := compound ( ( ">" | " " ) compound )*
//! compound  := ( tag | "*" )? ( "." class | "#" id | "[" attr ( op value )? "]" )*
//! op        := "=" | "~=" | "|=" | "^=" | "$=" | "*="
//! ```
//!
//! Anything else is rejected with `DomError::InvalidSelector`, the same way a
//! browser's query engine throws on bad syntax.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    error::ErrorKind,
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl AttrOp {
    fn test(self, actual: &str, expected: &str) -> bool {
        match self {
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|word| word == expected),
            AttrOp::DashMatch => {
                actual == expected
                    || (actual.starts_with(expected) && actual[expected.len()..].starts_with('-'))
            }
            // Empty operands never match for the substring family
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Class(String),
    Id(String),
    Attribute {
        name: String,
        test: Option<(AttrOp, String)>,
    },
}

impl SimpleSelector {
    fn matches(&self, node: &DomNode) -> bool {
        match self {
            SimpleSelector::Class(class) => node.has_class(class),
            SimpleSelector::Id(id) => node.attr("id") == Some(id.as_str()),
            SimpleSelector::Attribute { name, test } => match (node.attr(name), test) {
                (Some(_), None) => true,
                (Some(actual), Some((op, expected))) => op.test(actual, expected),
                (None, _) => false,
            },
        }
    }
}

/// Type/universal selector plus its simple selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    /// Upper-case tag; `None` is the universal selector
    pub tag: Option<String>,
    pub simple: Vec<SimpleSelector>,
}

impl Compound {
    pub fn matches(&self, node: &DomNode) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !node.node_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.simple.iter().all(|s| s.matches(node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// Compounds left to right; `combinators[k]` sits between compounds `k` and `k + 1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub compounds: Vec<Compound>,
    pub combinators: Vec<Combinator>,
}

impl ComplexSelector {
    pub fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        match self.compounds.len() {
            0 => false,
            len => self.matches_at(arena, node_id, len - 1),
        }
    }

    // Right to left: the rightmost compound is tested against the node itself
    fn matches_at(&self, arena: &DomArena, node_id: NodeId, k: usize) -> bool {
        let node = match arena.get(node_id) {
            Ok(node) => node,
            Err(_) => return false,
        };
        if !self.compounds[k].matches(node) {
            return false;
        }
        if k == 0 {
            return true;
        }
        match self.combinators[k - 1] {
            Combinator::Child => node
                .parent_id
                .map_or(false, |parent_id| self.matches_at(arena, parent_id, k - 1)),
            Combinator::Descendant => arena
                .ancestors(node_id)
                .any(|ancestor| self.matches_at(arena, ancestor.node_id, k - 1)),
        }
    }
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let (_, selectors) =
            selector_list(source).map_err(|e| DomError::InvalidSelector {
                selector: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            selectors,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn selectors(&self) -> &[ComplexSelector] {
        &self.selectors
    }

    /// True if any selector in the list matches the node
    pub fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(arena, node_id))
    }
}

impl FromStr for SelectorList {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    ))(input)
}

fn attr_op(input: &str) -> IResult<&str, AttrOp> {
    alt((
        value(AttrOp::Substring, tag("*=")),
        value(AttrOp::Prefix, tag("^=")),
        value(AttrOp::Suffix, tag("$=")),
        value(AttrOp::Includes, tag("~=")),
        value(AttrOp::DashMatch, tag("|=")),
        value(AttrOp::Equals, tag("=")),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, SimpleSelector> {
    let (input, _) = terminated(char('['), multispace0)(input)?;
    let (input, name) = terminated(identifier, multispace0)(input)?;
    let (input, test) = opt(pair(
        terminated(attr_op, multispace0),
        terminated(alt((quoted, identifier)), multispace0),
    ))(input)?;
    let (input, _) = char(']')(input)?;

    Ok((
        input,
        SimpleSelector::Attribute {
            name: name.to_ascii_lowercase(),
            test: test.map(|(op, expected)| (op, expected.to_string())),
        },
    ))
}

fn simple_selector(input: &str) -> IResult<&str, SimpleSelector> {
    alt((
        map(preceded(char('.'), identifier), |class: &str| {
            SimpleSelector::Class(class.to_string())
        }),
        map(preceded(char('#'), identifier), |id: &str| {
            SimpleSelector::Id(id.to_string())
        }),
        attribute,
    ))(input)
}

fn compound(input: &str) -> IResult<&str, Compound> {
    let (rest, tag_name) = opt(alt((
        value(None::<&str>, char('*')),
        map(identifier, Some),
    )))(input)?;
    let (rest, simple) = many0(simple_selector)(rest)?;

    if tag_name.is_none() && simple.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Verify,
        )));
    }

    Ok((
        rest,
        Compound {
            tag: tag_name.flatten().map(str::to_ascii_uppercase),
            simple,
        },
    ))
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        value(
            Combinator::Child,
            delimited(multispace0, char('>'), multispace0),
        ),
        value(Combinator::Descendant, multispace1),
    ))(input)
}

fn complex(input: &str) -> IResult<&str, ComplexSelector> {
    let (input, first) = compound(input)?;
    let (input, rest) = many0(pair(combinator, compound))(input)?;

    let mut compounds = vec![first];
    let mut combinators = Vec::with_capacity(rest.len());
    for (comb, comp) in rest {
        combinators.push(comb);
        compounds.push(comp);
    }

    Ok((
        input,
        ComplexSelector {
            compounds,
            combinators,
        },
    ))
}

fn selector_list(input: &str) -> IResult<&str, Vec<ComplexSelector>> {
    all_consuming(delimited(
        multispace0,
        separated_list1(delimited(multispace0, char(','), multispace0), complex),
        multispace0,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    fn element(arena: &mut DomArena, parent: Option<NodeId>, tag: &str, class: &str) -> NodeId {
        let mut node = DomNode::element(tag);
        if !class.is_empty() {
            node.attributes.insert("class".to_string(), class.to_string());
        }
        let id = arena.add_node(node);
        if let Some(parent) = parent {
            arena.append_child(parent, id).unwrap();
        }
        id
    }

    #[test]
    fn test_parse_rule_shapes() {
        for source in [
            ".premium-subscription-entrypoint-module__premium-entrypoint",
            "[class*=\"app-banner\"]",
            "[class*='wdp-footer']",
            "a[href^=\"https://\"]",
            "footer > div.card, aside  p",
            "*",
        ] {
            let list = SelectorList::parse(source).unwrap();
            assert_eq!(list.source(), source);
        }
    }

    #[test]
    fn test_parse_rejects_bad_syntax() {
        for source in ["", "[class*=\"x\"", "..x", "div >", "a,,b", "[=x]"] {
            let err = SelectorList::parse(source).unwrap_err();
            assert!(
                matches!(err, DomError::InvalidSelector { .. }),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn test_attribute_substring_match() {
        let mut arena = DomArena::new();
        let div = element(&mut arena, None, "div", "x footer-module__root y");
        let list = SelectorList::parse("[class*=\"footer-module\"]").unwrap();
        assert!(list.matches(&arena, div));

        let other = element(&mut arena, None, "div", "footer");
        assert!(!list.matches(&arena, other));
    }

    #[test]
    fn test_combinators() {
        let mut arena = DomArena::new();
        let root = arena.add_node(DomNode::new(NodeType::Document, "#document"));
        let footer = element(&mut arena, Some(root), "footer", "");
        let div = element(&mut arena, Some(footer), "div", "card");
        let p = element(&mut arena, Some(div), "p", "");

        let child = SelectorList::parse("footer > p").unwrap();
        let descendant = SelectorList::parse("footer p").unwrap();
        let chained = SelectorList::parse("footer > .card > p").unwrap();

        assert!(!child.matches(&arena, p));
        assert!(descendant.matches(&arena, p));
        assert!(chained.matches(&arena, p));
        assert!(!descendant.matches(&arena, div));
    }

    #[test]
    fn test_dash_and_word_ops() {
        assert!(AttrOp::DashMatch.test("en-US", "en"));
        assert!(!AttrOp::DashMatch.test("english", "en"));
        assert!(AttrOp::Includes.test("a b c", "b"));
        assert!(!AttrOp::Substring.test("anything", ""));
    }
}
