//! Expression tree of a parsed PromQL query
//!
//! `Display` prints an expression in the canonical form Prometheus uses when
//! it prints a parsed query, e.g. `sum by(job) (rate(x[5m]))`.
use std::fmt;
use std::str::FromStr;

/// The type an expression evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Scalar,
    Vector,
    Matrix,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Scalar => "scalar",
            ValueType::Vector => "instant vector",
            ValueType::Matrix => "range vector",
            ValueType::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MILLIS_PER_SECOND: u64 = 1000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: u64 = 7 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: u64 = 365 * MILLIS_PER_DAY;

/// A duration as written in queries, e.g. `5m` or `1h30m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PromDuration(u64);

impl PromDuration {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ms = self.0;
        if ms == 0 {
            return f.write_str("0s");
        }

        // years and weeks only when they divide evenly, "90d" reads better than "12w6d"
        let units: [(&str, u64, bool); 7] = [
            ("y", MILLIS_PER_YEAR, true),
            ("w", MILLIS_PER_WEEK, true),
            ("d", MILLIS_PER_DAY, false),
            ("h", MILLIS_PER_HOUR, false),
            ("m", MILLIS_PER_MINUTE, false),
            ("s", MILLIS_PER_SECOND, false),
            ("ms", 1, false),
        ];

        for (unit, mult, exact) in units.iter() {
            if *exact && ms % mult != 0 {
                continue;
            }
            let v = ms / mult;
            if v > 0 {
                write!(f, "{}{}", v, unit)?;
                ms -= v * mult;
            }
        }

        Ok(())
    }
}

impl FromStr for PromDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let mut total: u64 = 0;
        let mut rest = s;
        while !rest.is_empty() {
            let digits_end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or_else(|| rest.len());
            if digits_end == 0 {
                return Err(format!("not a valid duration string: {:?}", s));
            }
            let value: u64 = rest[..digits_end]
                .parse()
                .map_err(|_| format!("not a valid duration string: {:?}", s))?;
            rest = &rest[digits_end..];

            let (mult, unit_len) = if rest.starts_with("ms") {
                (1, 2)
            } else {
                match rest.chars().next() {
                    Some('y') => (MILLIS_PER_YEAR, 1),
                    Some('w') => (MILLIS_PER_WEEK, 1),
                    Some('d') => (MILLIS_PER_DAY, 1),
                    Some('h') => (MILLIS_PER_HOUR, 1),
                    Some('m') => (MILLIS_PER_MINUTE, 1),
                    Some('s') => (MILLIS_PER_SECOND, 1),
                    _ => return Err(format!("not a valid duration string: {:?}", s)),
                }
            };
            rest = &rest[unit_len..];

            total = value
                .checked_mul(mult)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| format!("duration out of range: {:?}", s))?;
        }

        Ok(PromDuration(total))
    }
}

/// A label matcher inside a selector like `job=~"api.*"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    Regex,
    NotRegex,
}

impl MatchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::Regex => "=~",
            MatchOp::NotRegex => "!~",
        }
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op.as_str(), quote(&self.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VectorSelector {
    pub name: Option<String>,
    pub matchers: Vec<LabelMatcher>,
    pub offset: Option<PromDuration>,
}

impl VectorSelector {
    fn fmt_without_offset(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("");

        let mut labels = self
            .matchers
            .iter()
            .filter(|m| !(m.name == "__name__" && m.op == MatchOp::Equal && m.value == name))
            .map(LabelMatcher::to_string)
            .collect::<Vec<_>>();

        f.write_str(name)?;
        if !labels.is_empty() {
            labels.sort();
            write!(f, "{{{}}}", labels.join(","))?;
        }
        Ok(())
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_without_offset(f)?;
        fmt_offset(self.offset, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixSelector {
    pub selector: VectorSelector,
    pub range: PromDuration,
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.selector.fmt_without_offset(f)?;
        write!(f, "[{}]", self.range)?;
        fmt_offset(self.selector.offset, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    pub expr: Box<Expr>,
    pub range: PromDuration,
    pub step: Option<PromDuration>,
    pub offset: Option<PromDuration>,
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:", self.expr, self.range)?;
        if let Some(step) = self.step {
            write!(f, "{}", step)?;
        }
        f.write_str("]")?;
        fmt_offset(self.offset, f)
    }
}

fn fmt_offset(offset: Option<PromDuration>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match offset {
        Some(offset) if !offset.is_zero() => write!(f, " offset {}", offset),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Group,
    Stddev,
    Stdvar,
    Topk,
    Bottomk,
    CountValues,
    Quantile,
}

impl AggregateOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name.to_ascii_lowercase().as_str() {
            "sum" => AggregateOp::Sum,
            "avg" => AggregateOp::Avg,
            "count" => AggregateOp::Count,
            "min" => AggregateOp::Min,
            "max" => AggregateOp::Max,
            "group" => AggregateOp::Group,
            "stddev" => AggregateOp::Stddev,
            "stdvar" => AggregateOp::Stdvar,
            "topk" => AggregateOp::Topk,
            "bottomk" => AggregateOp::Bottomk,
            "count_values" => AggregateOp::CountValues,
            "quantile" => AggregateOp::Quantile,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Group => "group",
            AggregateOp::Stddev => "stddev",
            AggregateOp::Stdvar => "stdvar",
            AggregateOp::Topk => "topk",
            AggregateOp::Bottomk => "bottomk",
            AggregateOp::CountValues => "count_values",
            AggregateOp::Quantile => "quantile",
        }
    }

    /// `topk(5, x)` and friends take a parameter before the expression
    pub fn takes_param(self) -> bool {
        matches!(
            self,
            AggregateOp::Topk
                | AggregateOp::Bottomk
                | AggregateOp::CountValues
                | AggregateOp::Quantile
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOp,
    pub expr: Box<Expr>,
    pub param: Option<Box<Expr>>,
    pub grouping: Vec<String>,
    pub without: bool,
}

impl AggregateExpr {
    /// `true` for `sum by(..)` and `sum without(..)`
    pub fn has_grouping(&self) -> bool {
        !self.grouping.is_empty() || self.without
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op.as_str())?;
        if self.without {
            write!(f, " without({}) ", self.grouping.join(", "))?;
        } else if !self.grouping.is_empty() {
            write!(f, " by({}) ", self.grouping.join(", "))?;
        }

        match self.param {
            Some(ref param) => write!(f, "({}, {})", param, self.expr),
            None => write!(f, "({})", self.expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: &'static Function,
    pub args: Vec<Expr>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

/// A built-in function
#[derive(Debug, PartialEq, Eq)]
pub struct Function {
    pub name: &'static str,
    pub return_type: ValueType,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
}

macro_rules! functions {
    ($($name:literal => $ret:ident, $min:expr, $max:expr;)*) => {
        const FUNCTIONS: &[Function] = &[
            $(Function {
                name: $name,
                return_type: ValueType::$ret,
                min_args: $min,
                max_args: $max,
            },)*
        ];
    };
}

functions! {
    "abs" => Vector, 1, Some(1);
    "absent" => Vector, 1, Some(1);
    "absent_over_time" => Vector, 1, Some(1);
    "acos" => Vector, 1, Some(1);
    "acosh" => Vector, 1, Some(1);
    "asin" => Vector, 1, Some(1);
    "asinh" => Vector, 1, Some(1);
    "atan" => Vector, 1, Some(1);
    "atanh" => Vector, 1, Some(1);
    "avg_over_time" => Vector, 1, Some(1);
    "ceil" => Vector, 1, Some(1);
    "changes" => Vector, 1, Some(1);
    "clamp" => Vector, 3, Some(3);
    "clamp_max" => Vector, 2, Some(2);
    "clamp_min" => Vector, 2, Some(2);
    "cos" => Vector, 1, Some(1);
    "cosh" => Vector, 1, Some(1);
    "count_over_time" => Vector, 1, Some(1);
    "day_of_month" => Vector, 0, Some(1);
    "day_of_week" => Vector, 0, Some(1);
    "days_in_month" => Vector, 0, Some(1);
    "deg" => Vector, 1, Some(1);
    "delta" => Vector, 1, Some(1);
    "deriv" => Vector, 1, Some(1);
    "exp" => Vector, 1, Some(1);
    "floor" => Vector, 1, Some(1);
    "histogram_quantile" => Vector, 2, Some(2);
    "holt_winters" => Vector, 3, Some(3);
    "hour" => Vector, 0, Some(1);
    "idelta" => Vector, 1, Some(1);
    "increase" => Vector, 1, Some(1);
    "irate" => Vector, 1, Some(1);
    "label_join" => Vector, 3, None;
    "label_replace" => Vector, 5, Some(5);
    "last_over_time" => Vector, 1, Some(1);
    "ln" => Vector, 1, Some(1);
    "log10" => Vector, 1, Some(1);
    "log2" => Vector, 1, Some(1);
    "max_over_time" => Vector, 1, Some(1);
    "min_over_time" => Vector, 1, Some(1);
    "minute" => Vector, 0, Some(1);
    "month" => Vector, 0, Some(1);
    "pi" => Scalar, 0, Some(0);
    "predict_linear" => Vector, 2, Some(2);
    "present_over_time" => Vector, 1, Some(1);
    "quantile_over_time" => Vector, 2, Some(2);
    "rad" => Vector, 1, Some(1);
    "rate" => Vector, 1, Some(1);
    "resets" => Vector, 1, Some(1);
    "round" => Vector, 1, Some(2);
    "scalar" => Scalar, 1, Some(1);
    "sgn" => Vector, 1, Some(1);
    "sin" => Vector, 1, Some(1);
    "sinh" => Vector, 1, Some(1);
    "sort" => Vector, 1, Some(1);
    "sort_desc" => Vector, 1, Some(1);
    "sqrt" => Vector, 1, Some(1);
    "stddev_over_time" => Vector, 1, Some(1);
    "stdvar_over_time" => Vector, 1, Some(1);
    "sum_over_time" => Vector, 1, Some(1);
    "tan" => Vector, 1, Some(1);
    "tanh" => Vector, 1, Some(1);
    "time" => Scalar, 0, Some(0);
    "timestamp" => Vector, 1, Some(1);
    "vector" => Vector, 1, Some(1);
    "year" => Vector, 0, Some(1);
}

impl Function {
    pub fn lookup(name: &str) -> Option<&'static Function> {
        FUNCTIONS.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Add,
    Sub,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Add => "+",
            UnaryOp::Sub => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Atan2,
    Eql,
    Neq,
    Lss,
    Lte,
    Gtr,
    Gte,
    And,
    Or,
    Unless,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Eql => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lss => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gtr => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Unless => "unless",
        }
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And | BinaryOp::Unless => 2,
            BinaryOp::Eql
            | BinaryOp::Neq
            | BinaryOp::Lss
            | BinaryOp::Lte
            | BinaryOp::Gtr
            | BinaryOp::Gte => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Atan2 => 5,
            BinaryOp::Pow => 6,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == BinaryOp::Pow
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }

    pub fn is_set_operator(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Unless)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// `on(..)`/`ignoring(..)` and `group_left(..)`/`group_right(..)` modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatching {
    pub card: Cardinality,
    pub matching_labels: Vec<String>,
    pub on: bool,
    pub include: Vec<String>,
}

impl Default for VectorMatching {
    fn default() -> Self {
        Self {
            card: Cardinality::OneToOne,
            matching_labels: Vec::new(),
            on: false,
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub return_bool: bool,
    pub matching: Option<VectorMatching>,
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lhs, self.op)?;
        if self.return_bool {
            f.write_str(" bool")?;
        }

        if let Some(ref vm) = self.matching {
            if !vm.matching_labels.is_empty() || vm.on {
                let keyword = if vm.on { "on" } else { "ignoring" };
                write!(f, " {}({})", keyword, vm.matching_labels.join(", "))?;

                match vm.card {
                    Cardinality::ManyToOne => write!(f, " group_left({})", vm.include.join(", "))?,
                    Cardinality::OneToMany => write!(f, " group_right({})", vm.include.join(", "))?,
                    _ => {}
                }
            }
        }

        write!(f, " {}", self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Vector(VectorSelector),
    Matrix(MatrixSelector),
    Subquery(SubqueryExpr),
    Aggregate(AggregateExpr),
    Call(Call),
    Paren(Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryExpr),
}

impl Expr {
    pub fn value_type(&self) -> ValueType {
        match self {
            Expr::Number(_) => ValueType::Scalar,
            Expr::String(_) => ValueType::String,
            Expr::Vector(_) => ValueType::Vector,
            Expr::Matrix(_) | Expr::Subquery(_) => ValueType::Matrix,
            Expr::Aggregate(_) => ValueType::Vector,
            Expr::Call(call) => call.func.return_type,
            Expr::Paren(expr) | Expr::Unary(_, expr) => expr.value_type(),
            Expr::Binary(binary) => {
                if binary.lhs.value_type() == ValueType::Scalar
                    && binary.rhs.value_type() == ValueType::Scalar
                {
                    ValueType::Scalar
                } else {
                    ValueType::Vector
                }
            }
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.value_type() == ValueType::Scalar
    }

    pub fn as_binary(&self) -> Option<&BinaryExpr> {
        match self {
            Expr::Binary(binary) => Some(binary),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateExpr> {
        match self {
            Expr::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => f.write_str(&format_number(*v)),
            Expr::String(s) => f.write_str(&quote(s)),
            Expr::Vector(selector) => write!(f, "{}", selector),
            Expr::Matrix(selector) => write!(f, "{}", selector),
            Expr::Subquery(subquery) => write!(f, "{}", subquery),
            Expr::Aggregate(aggregate) => write!(f, "{}", aggregate),
            Expr::Call(call) => write!(f, "{}", call),
            Expr::Paren(expr) => write!(f, "({})", expr),
            Expr::Unary(op, expr) => write!(f, "{}{}", op.as_str(), expr),
            Expr::Binary(binary) => write!(f, "{}", binary),
        }
    }
}

/// Formats a number the way Prometheus prints number literals.
///
/// The shortest representation is used. Exponents below -4 or from 6
/// upwards switch to scientific notation with at least two exponent digits.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let scientific = format!("{:e}", v);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return format!("{}", v),
    };
    let exponent: i32 = match exponent.parse() {
        Ok(exponent) => exponent,
        Err(_) => return format!("{}", v),
    };

    if exponent < -4 || exponent >= 6 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        format!("{}", v)
    }
}

/// Quotes a string with double quotes, escaping like Go's `%q`.
pub fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\u{7}' => quoted.push_str("\\a"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            '\u{b}' => quoted.push_str("\\v"),
            c if c.is_control() => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn durations_print_canonically() {
        let cases = [
            ("5m", "5m"),
            ("90m", "1h30m"),
            ("0s", "0s"),
            ("14d", "2w"),
            ("15d", "15d"),
            ("1y", "1y"),
            ("1500ms", "1s500ms"),
            ("1h0m30s", "1h30s"),
        ];

        for (input, expected) in cases.iter() {
            let duration = input.parse::<PromDuration>().unwrap();
            assert_eq!(duration.to_string(), *expected, "{}", input);
        }
    }

    #[test]
    fn bad_durations() {
        assert!("".parse::<PromDuration>().is_err());
        assert!("5".parse::<PromDuration>().is_err());
        assert!("m".parse::<PromDuration>().is_err());
        assert!("5x".parse::<PromDuration>().is_err());
    }

    #[test]
    fn numbers_print_like_prometheus() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-2.25), "-2.25");
        assert_eq!(format_number(100000.0), "100000");
        assert_eq!(format_number(1000000.0), "1e+06");
        assert_eq!(format_number(1234567.0), "1.234567e+06");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(0.00001), "1e-05");
        assert_eq!(format_number(f64::INFINITY), "+Inf");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("api"), "\"api\"");
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    }

    #[test]
    fn selector_omits_redundant_name_matcher() {
        let selector = VectorSelector {
            name: Some("up".to_string()),
            matchers: vec![
                LabelMatcher {
                    name: "job".to_string(),
                    op: MatchOp::Equal,
                    value: "node".to_string(),
                },
                LabelMatcher {
                    name: "__name__".to_string(),
                    op: MatchOp::Equal,
                    value: "up".to_string(),
                },
                LabelMatcher {
                    name: "env".to_string(),
                    op: MatchOp::NotRegex,
                    value: "dev.*".to_string(),
                },
            ],
            offset: Some(PromDuration::from_millis(5 * MILLIS_PER_MINUTE)),
        };

        assert_eq!(selector.to_string(), "up{env!~\"dev.*\",job=\"node\"} offset 5m");
    }

    #[test]
    fn precedence_levels() {
        assert!(BinaryOp::Pow.precedence() > BinaryOp::Mul.precedence());
        assert!(BinaryOp::Atan2.precedence() == BinaryOp::Div.precedence());
        assert!(BinaryOp::Sub.precedence() > BinaryOp::Gte.precedence());
        assert!(BinaryOp::Gte.precedence() > BinaryOp::Unless.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(BinaryOp::Lte.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }
}
