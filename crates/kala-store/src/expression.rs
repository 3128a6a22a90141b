use bson::Bson;
use regex::Regex;

/// A recursive filter expression tree.
///
/// Borrows field names and values from the filter document it was parsed
/// from; the lifetime `'a` is tied to that `Document`.
#[derive(Debug, Clone)]
pub enum Expression<'a> {
    // Logical
    And(Vec<Expression<'a>>),
    Or(Vec<Expression<'a>>),
    Nor(Vec<Expression<'a>>),
    Not(Box<Expression<'a>>),
    // Comparison
    Eq(&'a str, &'a Bson),
    Ne(&'a str, &'a Bson),
    Gt(&'a str, &'a Bson),
    Gte(&'a str, &'a Bson),
    Lt(&'a str, &'a Bson),
    Lte(&'a str, &'a Bson),
    // Membership
    In(&'a str, &'a [Bson]),
    Nin(&'a str, &'a [Bson]),
    // Pattern
    Regex(&'a str, Regex),
    // Existence
    Exists(&'a str, bool),
}

impl Expression<'_> {
    /// The expression that matches every document (an empty filter).
    pub fn all() -> Self {
        Expression::And(Vec::new())
    }
}

impl PartialEq for Expression<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expression::And(a), Expression::And(b)) => a == b,
            (Expression::Or(a), Expression::Or(b)) => a == b,
            (Expression::Nor(a), Expression::Nor(b)) => a == b,
            (Expression::Not(a), Expression::Not(b)) => a == b,
            (Expression::Eq(f1, v1), Expression::Eq(f2, v2))
            | (Expression::Ne(f1, v1), Expression::Ne(f2, v2))
            | (Expression::Gt(f1, v1), Expression::Gt(f2, v2))
            | (Expression::Gte(f1, v1), Expression::Gte(f2, v2))
            | (Expression::Lt(f1, v1), Expression::Lt(f2, v2))
            | (Expression::Lte(f1, v1), Expression::Lte(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::In(f1, v1), Expression::In(f2, v2))
            | (Expression::Nin(f1, v1), Expression::Nin(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Regex(f1, r1), Expression::Regex(f2, r2)) => {
                f1 == f2 && r1.as_str() == r2.as_str()
            }
            (Expression::Exists(f1, b1), Expression::Exists(f2, b2)) => f1 == f2 && b1 == b2,
            _ => false,
        }
    }
}
