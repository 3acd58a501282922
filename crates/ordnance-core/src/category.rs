//! Category bitmasks and load-time category expressions.
//!
//! Every simulated object carries a [`Categories`] bitmask describing what it
//! is (a `MISSILE`, an `AIR` `UNIT`, ...). Rules that depend on membership are
//! written in content as small expressions (`"ANTIMISSILE * PROJECTILE"`,
//! `"TORPEDO + MISSILE - TACTICAL"`) and compiled once, at content-load time,
//! into a [`CategorySet`]. Collision checks then only test bits.
//!
//! Operators follow the content convention: `*` is intersection and binds
//! tighter than `+` (union) and `-` (difference), which are left-associative.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ContentError;
use crate::world::EntityId;

bitflags! {
    /// Category membership of a simulated object.
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
    )]
    pub struct Categories: u64 {
        /// Any unit (buildable, owned entity).
        const UNIT = 1 << 0;
        /// Immobile unit.
        const STRUCTURE = 1 << 1;
        /// Unit able to move.
        const MOBILE = 1 << 2;
        /// Ground layer.
        const LAND = 1 << 3;
        /// Air layer.
        const AIR = 1 << 4;
        /// Water surface layer.
        const NAVAL = 1 << 5;
        /// Below the water surface.
        const SUBMERSIBLE = 1 << 6;
        /// Any projectile.
        const PROJECTILE = 1 << 7;
        /// Underwater munition.
        const TORPEDO = 1 << 8;
        /// Self-propelled guided munition.
        const MISSILE = 1 << 9;
        /// Ballistic munition fired on a flat trajectory.
        const DIRECTFIRE = 1 << 10;
        /// Ballistic munition fired on an arcing trajectory.
        const INDIRECTFIRE = 1 << 11;
        /// Interceptor of missiles.
        const ANTIMISSILE = 1 << 12;
        /// Interceptor of torpedoes.
        const ANTITORPEDO = 1 << 13;
        /// Tactical-class missile.
        const TACTICAL = 1 << 14;
        /// Strategic-class missile.
        const STRATEGIC = 1 << 15;
        /// Nuclear warhead.
        const NUKE = 1 << 16;
        /// Shield bubble or shield generator.
        const SHIELD = 1 << 17;
        /// Decoy that attracts guided munitions.
        const FLARE = 1 << 18;
        /// Terrain prop (trees, rocks, wreckage).
        const PROP = 1 << 19;
        /// Experimental-tier unit.
        const EXPERIMENTAL = 1 << 20;
        /// Commander unit.
        const COMMAND = 1 << 21;
    }
}

/// Projectile classes that never collide with each other.
pub const COLLISION_EXCLUSIVE: Categories = Categories::TORPEDO
    .union(Categories::MISSILE)
    .union(Categories::DIRECTFIRE);

impl Categories {
    /// Looks up a single category by its content name (case-insensitive).
    ///
    /// `ALLPROJECTILES` is accepted as an alias for `PROJECTILE`.
    #[must_use]
    pub fn parse_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        if upper == "ALLPROJECTILES" {
            return Some(Self::PROJECTILE);
        }
        Self::from_name_exact(&upper)
    }

    fn from_name_exact(upper: &str) -> Option<Self> {
        Self::all()
            .iter_names()
            .find(|(flag_name, _)| *flag_name == upper)
            .map(|(_, flag)| flag)
    }

    /// Parses a whitespace- or comma-separated list of names into one mask.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::UnknownCategory`] for any unrecognised name.
    pub fn parse_list(list: &str) -> Result<Self, ContentError> {
        list.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .try_fold(Self::empty(), |acc, name| {
                Self::parse_name(name)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| ContentError::UnknownCategory(name.to_string()))
            })
    }
}

/// One conjunctive term of a [`CategorySet`]: everything in `all`, and none
/// of the masks in `excluded` in full.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Term {
    all: Categories,
    excluded: Vec<Categories>,
}

impl Term {
    fn matches(&self, categories: Categories) -> bool {
        !self.all.is_empty()
            && categories.contains(self.all)
            && !self.excluded.iter().any(|e| categories.contains(*e))
    }
}

/// Compiled category expression.
///
/// An empty set matches nothing.
///
/// # Example
///
/// ```
/// use ordnance_core::category::{Categories, CategorySet};
///
/// let set: CategorySet = "ANTIMISSILE * PROJECTILE".parse().unwrap();
/// assert!(set.matches(Categories::ANTIMISSILE | Categories::PROJECTILE));
/// assert!(!set.matches(Categories::ANTIMISSILE | Categories::STRUCTURE));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategorySet {
    terms: Vec<Term>,
    source: String,
}

impl CategorySet {
    /// A set that matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set matching anything that has at least one of `categories`.
    #[must_use]
    pub fn any_of(categories: Categories) -> Self {
        let terms = categories
            .iter()
            .map(|flag| Term {
                all: flag,
                excluded: Vec::new(),
            })
            .collect();
        Self {
            terms,
            source: Self::joined_names(categories, " + "),
        }
    }

    /// A set matching anything that has every one of `categories`.
    #[must_use]
    pub fn all_of(categories: Categories) -> Self {
        Self {
            terms: vec![Term {
                all: categories,
                excluded: Vec::new(),
            }],
            source: Self::joined_names(categories, " * "),
        }
    }

    fn joined_names(categories: Categories, separator: &str) -> String {
        categories
            .iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Returns `true` if an object with `categories` belongs to this set.
    #[must_use]
    pub fn matches(&self, categories: Categories) -> bool {
        self.terms.iter().any(|term| term.matches(categories))
    }

    /// Returns `true` if the set can never match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Union of two compiled sets.
    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        self.terms.extend(other.terms.iter().cloned());
        if !other.source.is_empty() {
            if !self.source.is_empty() {
                self.source.push_str(" + ");
            }
            self.source.push_str(&other.source);
        }
        self
    }

    /// Compiles a list of expressions into their union.
    ///
    /// # Errors
    ///
    /// Returns the first parse error encountered.
    pub fn from_expressions<S: AsRef<str>>(exprs: &[S]) -> Result<Self, ContentError> {
        exprs.iter().try_fold(Self::empty(), |acc, expr| {
            let set: Self = expr.as_ref().parse()?;
            Ok(acc.union(&set))
        })
    }

    fn parse_product(product: &str, whole: &str) -> Result<Categories, ContentError> {
        product.split('*').try_fold(Categories::empty(), |acc, name| {
            let name = name.trim();
            if name.is_empty() {
                return Err(ContentError::MalformedCategoryExpression(whole.to_string()));
            }
            Categories::parse_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| ContentError::UnknownCategory(name.to_string()))
        })
    }
}

impl FromStr for CategorySet {
    type Err = ContentError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let mut terms: Vec<Term> = Vec::new();
        let mut op = '+';
        let mut rest = expr.trim();
        if rest.is_empty() {
            return Ok(Self::empty());
        }

        loop {
            let split = rest.find(['+', '-']);
            let (product, next) = match split {
                Some(i) => (&rest[..i], Some((rest.as_bytes()[i] as char, &rest[i + 1..]))),
                None => (rest, None),
            };
            let mask = Self::parse_product(product, expr)?;
            if op == '+' {
                terms.push(Term {
                    all: mask,
                    excluded: Vec::new(),
                });
            } else {
                for term in &mut terms {
                    term.excluded.push(mask);
                }
            }
            match next {
                Some((next_op, tail)) => {
                    op = next_op;
                    rest = tail;
                }
                None => break,
            }
        }

        Ok(Self {
            terms,
            source: expr.trim().to_string(),
        })
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.source)
        }
    }
}

impl Serialize for CategorySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CategorySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        expr.parse().map_err(serde::de::Error::custom)
    }
}

/// Deserializes a list of category expressions into their compiled union.
///
/// Used for content fields such as `DoNotCollideList`.
///
/// # Errors
///
/// Fails deserialization on unknown names or malformed expressions.
pub fn deserialize_expression_list<'de, D>(deserializer: D) -> Result<CategorySet, D::Error>
where
    D: Deserializer<'de>,
{
    let exprs = Vec::<String>::deserialize(deserializer)?;
    CategorySet::from_expressions(&exprs).map_err(serde::de::Error::custom)
}

/// Deserializes a list of single category names into one mask.
///
/// # Errors
///
/// Fails deserialization on unknown names.
pub fn deserialize_name_list<'de, D>(deserializer: D) -> Result<Categories, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Categories::parse_list(&names.join(" ")).map_err(serde::de::Error::custom)
}

/// Writes a compiled set back as a one-expression list (empty when the set
/// is empty). Counterpart of [`deserialize_expression_list`].
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_expression_list<S>(set: &CategorySet, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let exprs: Vec<&str> = if set.source.is_empty() {
        Vec::new()
    } else {
        vec![set.source.as_str()]
    };
    exprs.serialize(serializer)
}

/// Writes a mask as a list of category names. Counterpart of
/// [`deserialize_name_list`].
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_name_list<S>(categories: &Categories, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let names: Vec<&str> = categories.iter_names().map(|(name, _)| name).collect();
    names.serialize(serializer)
}

/// Category membership lookup offered by the host.
pub trait CategoryQuery {
    /// Categories of a live entity; empty for unknown or destroyed entities.
    fn categories_of(&self, entity: EntityId) -> Categories;

    /// Returns `true` if `entity` belongs to `set`.
    fn category_contains(&self, set: &CategorySet, entity: EntityId) -> bool {
        set.matches(self.categories_of(entity))
    }
}
