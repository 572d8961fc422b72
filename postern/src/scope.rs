//! Ordered scope lists

use std::{borrow::Borrow, convert::Infallible, fmt, iter::FromIterator, slice, str::FromStr, vec};

use serde::{Deserialize, Serialize};

use crate::{Scope, ScopeRef};

/// An ordered list of scopes
///
/// The list keeps scopes in the order they were requested and does not
/// deduplicate them. It is only ever consulted through membership queries,
/// so neither order nor duplicates change the outcome of a check.
///
/// On the wire, a scope list is a JSON array of strings. In a token request,
/// it is a single space-delimited string.
///
/// ```
/// use postern::{ScopeRef, Scopes};
///
/// let scopes: Scopes = "read  write".parse().unwrap();
/// assert_eq!(scopes.len(), 2);
/// assert!(scopes.contains(ScopeRef::from_str("write")));
/// assert_eq!(scopes.to_string(), "read write");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(Vec<Scope>);

impl Scopes {
    /// Produces an empty scope list
    #[inline]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Constructs a scope list holding a single scope
    #[inline]
    pub fn single(scope: impl Into<Scope>) -> Self {
        Self(vec![scope.into()])
    }

    /// Appends a scope to the end of the list
    #[inline]
    pub fn push(&mut self, scope: impl Into<Scope>) {
        self.0.push(scope.into());
    }

    /// Appends a scope, returning the extended list
    #[inline]
    pub fn and(self, scope: impl Into<Scope>) -> Self {
        let mut s = self;
        s.push(scope);
        s
    }

    /// The number of entries, duplicates included
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list holds no scopes at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Produces an iterator over the scopes, in order
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Checks whether `scope` appears in the list
    ///
    /// The comparison is exact and case-sensitive.
    #[inline]
    pub fn contains(&self, scope: &ScopeRef) -> bool {
        self.0.iter().any(|s| s.as_str() == scope.as_str())
    }

    /// Checks to see whether this list contains every one of the
    /// `required` scopes
    ///
    /// An empty requirement is always satisfied.
    #[inline]
    pub fn contains_all<I, T>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Borrow<ScopeRef>,
    {
        required.into_iter().all(|r| self.contains(r.borrow()))
    }

    /// Returns the first of the `required` scopes that this list lacks
    pub fn first_missing<I, T>(&self, required: I) -> Option<T>
    where
        I: IntoIterator<Item = T>,
        T: Borrow<ScopeRef>,
    {
        required.into_iter().find(|r| !self.contains(r.borrow()))
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scopes = self.0.iter();
        if let Some(first) = scopes.next() {
            f.write_str(first.as_str())?;
            for scope in scopes {
                f.write_str(" ")?;
                f.write_str(scope.as_str())?;
            }
        }
        Ok(())
    }
}

/// Splits a space-delimited scope string, ignoring empty segments
impl FromStr for Scopes {
    type Err = Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split(' ')
            .filter(|s| !s.is_empty())
            .map(|s| Scope::new(s.to_owned()))
            .collect())
    }
}

impl From<Vec<Scope>> for Scopes {
    #[inline]
    fn from(scopes: Vec<Scope>) -> Self {
        Self(scopes)
    }
}

impl From<Scopes> for Vec<Scope> {
    #[inline]
    fn from(scopes: Scopes) -> Self {
        scopes.0
    }
}

impl IntoIterator for Scopes {
    type Item = Scope;
    type IntoIter = vec::IntoIter<Scope>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a list of borrowed scopes
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: slice::Iter<'a, Scope>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| &**x)
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a ScopeRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl<S> Extend<S> for Scopes
where
    S: Into<Scope>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<S> FromIterator<S> for Scopes
where
    S: Into<Scope>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut list = Self::empty();
        list.extend(iter);
        list
    }
}

/// Construct a [`Scopes`] list from string literals
///
/// ```
/// let scopes = postern::scopes!["read", "write"];
/// assert_eq!(scopes.to_string(), "read write");
/// ```
#[macro_export]
macro_rules! scopes {
    ($($scope:literal),* $(,)?) => {
        $crate::Scopes::empty()
        $(
            .and($crate::Scope::from_static($scope))
        )*
    };
}
