//! Recursive descent parser with precedence climbing for binary operators
use super::ast::*;
use super::lexer::{Lexer, Spanned, Token};
use super::ParseError;

/// Unary operators bind like multiplication, so `-a ^ b` is `-(a ^ b)`.
const UNARY_OPERAND_PRECEDENCE: u8 = 6;

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self { tokens, pos: 0 })
    }

    /// Parses a complete expression. Trailing input is an error.
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.current() == &Token::Eof {
            return Err(self.error("no expression found in input"));
        }

        let expr = self.parse_expr(0)?;
        if self.current() != &Token::Eof {
            return Err(self.error(format!(
                "unexpected {} after expression",
                describe(self.current())
            )));
        }
        Ok(expr)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn error<T: Into<String>>(&self, message: T) -> ParseError {
        ParseError::new(message, self.position())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} but found {}",
                describe(&expected),
                describe(self.current())
            )))
        }
    }

    fn current_keyword(&self) -> Option<String> {
        match self.current() {
            Token::Ident(word) => Some(word.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.current_keyword().as_deref() == Some(keyword)
    }

    fn current_binary_op(&self) -> Option<BinaryOp> {
        let op = match self.current() {
            Token::Add => BinaryOp::Add,
            Token::Sub => BinaryOp::Sub,
            Token::Mul => BinaryOp::Mul,
            Token::Div => BinaryOp::Div,
            Token::Mod => BinaryOp::Mod,
            Token::Pow => BinaryOp::Pow,
            Token::Eql => BinaryOp::Eql,
            Token::Neq => BinaryOp::Neq,
            Token::Lss => BinaryOp::Lss,
            Token::Lte => BinaryOp::Lte,
            Token::Gtr => BinaryOp::Gtr,
            Token::Gte => BinaryOp::Gte,
            Token::Ident(word) => match word.to_ascii_lowercase().as_str() {
                "and" => BinaryOp::And,
                "or" => BinaryOp::Or,
                "unless" => BinaryOp::Unless,
                "atan2" => BinaryOp::Atan2,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.current_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            let op_position = self.position();
            self.advance();

            let return_bool = if self.at_keyword("bool") {
                if !op.is_comparison() {
                    return Err(self.error("bool modifier can only be used on comparison operators"));
                }
                self.advance();
                true
            } else {
                false
            };

            let matching = self.parse_vector_matching(op)?;

            let next_min = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.parse_expr(next_min)?;

            lhs = build_binary(op, lhs, rhs, return_bool, matching, op_position)?;
        }

        Ok(lhs)
    }

    fn parse_vector_matching(&mut self, op: BinaryOp) -> Result<Option<VectorMatching>, ParseError> {
        let mut matching = if op.is_set_operator() {
            Some(VectorMatching {
                card: Cardinality::ManyToMany,
                ..VectorMatching::default()
            })
        } else {
            None
        };

        let on = match self.current_keyword().as_deref() {
            Some("on") => true,
            Some("ignoring") => false,
            _ => return Ok(matching),
        };
        self.advance();

        let labels = self.parse_label_list()?;
        let vm = matching.get_or_insert_with(VectorMatching::default);
        vm.on = on;
        vm.matching_labels = labels;

        let card = match self.current_keyword().as_deref() {
            Some("group_left") => Some(Cardinality::ManyToOne),
            Some("group_right") => Some(Cardinality::OneToMany),
            _ => None,
        };

        if let Some(card) = card {
            if op.is_set_operator() {
                return Err(self.error("no grouping allowed for set operations"));
            }
            self.advance();
            vm.card = card;
            if self.current() == &Token::LeftParen {
                vm.include = self.parse_label_list()?;
            }
        }

        Ok(matching)
    }

    fn parse_label_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(Token::LeftParen)?;
        let mut labels = Vec::new();
        loop {
            match self.current().clone() {
                Token::RightParen => {
                    self.advance();
                    return Ok(labels);
                }
                Token::Ident(label) if is_label_name(&label) => {
                    labels.push(label);
                    self.advance();
                    match self.current() {
                        Token::Comma => self.advance(),
                        Token::RightParen => {}
                        other => {
                            return Err(self.error(format!(
                                "unexpected {} in grouping opts, expected \",\" or \")\"",
                                describe(other)
                            )))
                        }
                    }
                }
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in grouping opts, expected label",
                        describe(&other)
                    )))
                }
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current() {
            Token::Add => UnaryOp::Add,
            Token::Sub => UnaryOp::Sub,
            _ => return self.parse_postfix(),
        };
        self.advance();

        let operand = self.parse_expr(UNARY_OPERAND_PRECEDENCE)?;

        match operand {
            Expr::Number(v) => Ok(Expr::Number(if op == UnaryOp::Sub { -v } else { v })),
            operand => {
                match operand.value_type() {
                    ValueType::Scalar | ValueType::Vector => {}
                    other => {
                        return Err(self.error(format!(
                            "unary expression only allowed on expressions of type scalar or instant vector, got {}",
                            other
                        )))
                    }
                }
                Ok(Expr::Unary(op, Box::new(operand)))
            }
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.current() == &Token::LeftBracket {
                expr = self.parse_range_or_subquery(expr)?;
            } else if self.at_keyword("offset") {
                self.advance();
                let offset = self.expect_duration()?;
                expr = apply_offset(expr, offset).map_err(|msg| self.error(msg))?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_range_or_subquery(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        let bracket_position = self.position();
        self.advance();
        let range = self.expect_duration()?;

        if self.current() == &Token::Colon {
            self.advance();
            let step = match self.current() {
                Token::Duration(step) => {
                    let step = *step;
                    self.advance();
                    Some(step)
                }
                _ => None,
            };
            self.expect(Token::RightBracket)?;

            return match expr.value_type() {
                ValueType::Vector => Ok(Expr::Subquery(SubqueryExpr {
                    expr: Box::new(expr),
                    range,
                    step,
                    offset: None,
                })),
                other => Err(ParseError::new(
                    format!("subquery is only allowed on instant vector, got {}", other),
                    bracket_position,
                )),
            };
        }

        self.expect(Token::RightBracket)?;

        match expr {
            Expr::Vector(selector) => Ok(Expr::Matrix(MatrixSelector { selector, range })),
            _ => Err(ParseError::new(
                "ranges only allowed for vector selectors",
                bracket_position,
            )),
        }
    }

    fn expect_duration(&mut self) -> Result<PromDuration, ParseError> {
        match self.current() {
            Token::Duration(duration) => {
                let duration = *duration;
                self.advance();
                Ok(duration)
            }
            other => Err(self.error(format!("expected duration but found {}", describe(other)))),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current().clone() {
            Token::Number(v) => {
                self.advance();
                Ok(Expr::Number(v))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(Token::RightParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            Token::LeftBrace => {
                let matchers = self.parse_matchers()?;
                self.vector_selector(None, matchers)
            }
            Token::Ident(word) => self.parse_identifier(word),
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    fn parse_identifier(&mut self, word: String) -> Result<Expr, ParseError> {
        if let Some(op) = AggregateOp::from_name(&word) {
            if self.peek() == &Token::LeftParen || is_grouping_keyword(self.peek()) {
                self.advance();
                return self.parse_aggregate(op);
            }
        }

        if self.peek() == &Token::LeftParen {
            let function = Function::lookup(&word)
                .ok_or_else(|| self.error(format!("unknown function with name {:?}", word)))?;
            self.advance();
            return self.parse_call(function);
        }

        if is_keyword(&word) {
            return Err(self.error(format!("unexpected keyword {:?}", word)));
        }

        self.advance();
        let matchers = if self.current() == &Token::LeftBrace {
            self.parse_matchers()?
        } else {
            Vec::new()
        };
        self.vector_selector(Some(word), matchers)
    }

    fn vector_selector(
        &self,
        name: Option<String>,
        mut matchers: Vec<LabelMatcher>,
    ) -> Result<Expr, ParseError> {
        if let Some(ref name) = name {
            if matchers.iter().any(|m| m.name == "__name__") {
                return Err(self.error(format!(
                    "metric name must not be set twice: {:?}",
                    name
                )));
            }
            matchers.push(LabelMatcher {
                name: "__name__".to_string(),
                op: MatchOp::Equal,
                value: name.clone(),
            });
        }

        if matchers.iter().all(matches_empty) {
            return Err(self.error(
                "vector selector must contain at least one non-empty matcher",
            ));
        }

        Ok(Expr::Vector(VectorSelector {
            name,
            matchers,
            offset: None,
        }))
    }

    fn parse_matchers(&mut self) -> Result<Vec<LabelMatcher>, ParseError> {
        self.expect(Token::LeftBrace)?;
        let mut matchers = Vec::new();

        loop {
            let name = match self.current().clone() {
                Token::RightBrace => {
                    self.advance();
                    return Ok(matchers);
                }
                Token::Ident(name) if is_label_name(&name) => name,
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in label matching, expected label",
                        describe(&other)
                    )))
                }
            };
            self.advance();

            let op = match self.current() {
                Token::Assign => MatchOp::Equal,
                Token::Neq => MatchOp::NotEqual,
                Token::EqlRegex => MatchOp::Regex,
                Token::NeqRegex => MatchOp::NotRegex,
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in label matching, expected label matching operator",
                        describe(other)
                    )))
                }
            };
            self.advance();

            let value = match self.current().clone() {
                Token::Str(value) => value,
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in label matching, expected string",
                        describe(&other)
                    )))
                }
            };

            if matches!(op, MatchOp::Regex | MatchOp::NotRegex) {
                regex::Regex::new(&format!("^(?:{})$", value))
                    .map_err(|err| self.error(format!("invalid regular expression: {}", err)))?;
            }
            self.advance();

            matchers.push(LabelMatcher { name, op, value });

            match self.current() {
                Token::Comma => self.advance(),
                Token::RightBrace => {}
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in label matching, expected \",\" or \"}}\"",
                        describe(other)
                    )))
                }
            }
        }
    }

    fn parse_aggregate(&mut self, op: AggregateOp) -> Result<Expr, ParseError> {
        let mut grouping = Vec::new();
        let mut without = false;
        let mut has_modifier = false;

        if let Some(keyword) = self.current_keyword() {
            if keyword == "by" || keyword == "without" {
                without = keyword == "without";
                self.advance();
                grouping = self.parse_label_list()?;
                has_modifier = true;
            }
        }

        let args_position = self.position();
        let mut args = self.parse_args()?;

        if !has_modifier {
            if let Some(keyword) = self.current_keyword() {
                if keyword == "by" || keyword == "without" {
                    without = keyword == "without";
                    self.advance();
                    grouping = self.parse_label_list()?;
                }
            }
        }

        let expected_args = if op.takes_param() { 2 } else { 1 };
        if args.len() != expected_args {
            return Err(ParseError::new(
                format!(
                    "wrong number of arguments for aggregate expression provided, expected {}, got {}",
                    expected_args,
                    args.len()
                ),
                args_position,
            ));
        }

        let expr = args.pop().map(Box::new).ok_or_else(|| {
            ParseError::new("missing aggregation expression", args_position)
        })?;
        if expr.value_type() != ValueType::Vector {
            return Err(ParseError::new(
                format!(
                    "expected type instant vector in aggregation expression, got {}",
                    expr.value_type()
                ),
                args_position,
            ));
        }
        let param = args.pop().map(Box::new);

        Ok(Expr::Aggregate(AggregateExpr {
            op,
            expr,
            param,
            grouping,
            without,
        }))
    }

    fn parse_call(&mut self, func: &'static Function) -> Result<Expr, ParseError> {
        let args_position = self.position();
        let args = self.parse_args()?;

        let too_few = args.len() < func.min_args;
        let too_many = func.max_args.map(|max| args.len() > max).unwrap_or(false);
        if too_few || too_many {
            return Err(ParseError::new(
                format!(
                    "wrong number of arguments for function {:?}, got {}",
                    func.name,
                    args.len()
                ),
                args_position,
            ));
        }

        Ok(Expr::Call(Call { func, args }))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        if self.current() == &Token::RightParen {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr(0)?);
            match self.current() {
                Token::Comma => self.advance(),
                Token::RightParen => {
                    self.advance();
                    return Ok(args);
                }
                other => {
                    return Err(self.error(format!(
                        "unexpected {} in argument list, expected \",\" or \")\"",
                        describe(other)
                    )))
                }
            }
        }
    }
}

fn build_binary(
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
    return_bool: bool,
    matching: Option<VectorMatching>,
    position: usize,
) -> Result<Expr, ParseError> {
    let lhs_type = lhs.value_type();
    let rhs_type = rhs.value_type();

    for side in [lhs_type, rhs_type].iter() {
        if *side != ValueType::Scalar && *side != ValueType::Vector {
            return Err(ParseError::new(
                format!(
                    "binary expression must contain only scalar and instant vector types, got {}",
                    side
                ),
                position,
            ));
        }
    }

    let both_scalar = lhs_type == ValueType::Scalar && rhs_type == ValueType::Scalar;

    if op.is_comparison() && both_scalar && !return_bool {
        return Err(ParseError::new(
            "comparisons between scalars must use BOOL modifier",
            position,
        ));
    }

    if op.is_set_operator() && (lhs_type == ValueType::Scalar || rhs_type == ValueType::Scalar) {
        return Err(ParseError::new(
            format!("set operator {:?} not allowed in binary scalar expression", op.as_str()),
            position,
        ));
    }

    let has_modifier = matching
        .as_ref()
        .map(|vm| vm.on || !vm.matching_labels.is_empty() || !vm.include.is_empty())
        .unwrap_or(false);
    if has_modifier && (lhs_type == ValueType::Scalar || rhs_type == ValueType::Scalar) {
        return Err(ParseError::new(
            "vector matching only allowed between instant vectors",
            position,
        ));
    }

    Ok(Expr::Binary(BinaryExpr {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        return_bool,
        matching,
    }))
}

fn apply_offset(expr: Expr, offset: PromDuration) -> Result<Expr, &'static str> {
    match expr {
        Expr::Vector(mut selector) => {
            if selector.offset.is_some() {
                return Err("offset may not be set multiple times");
            }
            selector.offset = Some(offset);
            Ok(Expr::Vector(selector))
        }
        Expr::Matrix(mut matrix) => {
            if matrix.selector.offset.is_some() {
                return Err("offset may not be set multiple times");
            }
            matrix.selector.offset = Some(offset);
            Ok(Expr::Matrix(matrix))
        }
        Expr::Subquery(mut subquery) => {
            if subquery.offset.is_some() {
                return Err("offset may not be set multiple times");
            }
            subquery.offset = Some(offset);
            Ok(Expr::Subquery(subquery))
        }
        _ => Err("offset modifier must be preceded by an instant vector selector, a range vector selector or a subquery"),
    }
}

const KEYWORDS: &[&str] = &[
    "and",
    "or",
    "unless",
    "atan2",
    "by",
    "without",
    "on",
    "ignoring",
    "group_left",
    "group_right",
    "bool",
    "offset",
];

/// Whether a series without the label passes the matcher.
fn matches_empty(matcher: &LabelMatcher) -> bool {
    match matcher.op {
        MatchOp::Equal => matcher.value.is_empty(),
        MatchOp::NotEqual => !matcher.value.is_empty(),
        MatchOp::Regex | MatchOp::NotRegex => {
            // regexes were validated while parsing the matchers
            let is_match = regex::Regex::new(&format!("^(?:{})$", matcher.value))
                .map(|re| re.is_match(""))
                .unwrap_or(false);
            is_match == (matcher.op == MatchOp::Regex)
        }
    }
}

fn is_keyword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

fn is_grouping_keyword(token: &Token) -> bool {
    match token {
        Token::Ident(word) => {
            let lower = word.to_ascii_lowercase();
            lower == "by" || lower == "without"
        }
        _ => false,
    }
}

/// Label names may not contain colons
fn is_label_name(word: &str) -> bool {
    !word.contains(':')
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(word) => format!("identifier {:?}", word),
        Token::Number(v) => format!("number {}", format_number(*v)),
        Token::Duration(d) => format!("duration {}", d),
        Token::Str(s) => format!("string {}", quote(s)),
        Token::LeftParen => "\"(\"".to_string(),
        Token::RightParen => "\")\"".to_string(),
        Token::LeftBrace => "\"{\"".to_string(),
        Token::RightBrace => "\"}\"".to_string(),
        Token::LeftBracket => "\"[\"".to_string(),
        Token::RightBracket => "\"]\"".to_string(),
        Token::Comma => "\",\"".to_string(),
        Token::Colon => "\":\"".to_string(),
        Token::Assign => "\"=\"".to_string(),
        Token::Eql => "\"==\"".to_string(),
        Token::Neq => "\"!=\"".to_string(),
        Token::Lss => "\"<\"".to_string(),
        Token::Lte => "\"<=\"".to_string(),
        Token::Gtr => "\">\"".to_string(),
        Token::Gte => "\">=\"".to_string(),
        Token::EqlRegex => "\"=~\"".to_string(),
        Token::NeqRegex => "\"!~\"".to_string(),
        Token::Add => "\"+\"".to_string(),
        Token::Sub => "\"-\"".to_string(),
        Token::Mul => "\"*\"".to_string(),
        Token::Div => "\"/\"".to_string(),
        Token::Mod => "\"%\"".to_string(),
        Token::Pow => "\"^\"".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}
