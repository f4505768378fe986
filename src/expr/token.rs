use std::fmt;

/// Operator and grouping tokens recognized by the tokenizer.
///
/// `StartP`/`EndP` are pure bracket markers: they participate in the
/// Shunting-Yard stacks but are never attached as tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Plus,
    Minus,
    Mult,
    Div,
    And,
    Or,
    Neg,
    StartP,
    EndP,
    Equal,
    NotEqual,
    Great,
    Less,
    GreatEqual,
    LessEqual,
}

impl Token {
    /// Binding priority; higher binds tighter. The grouping tokens carry
    /// sentinel priorities so that an open paren never forces a pop.
    pub fn prio(self) -> i32 {
        match self {
            Token::Or => 1,
            Token::And => 2,
            Token::Equal
            | Token::NotEqual
            | Token::Great
            | Token::Less
            | Token::GreatEqual
            | Token::LessEqual => 3,
            Token::Neg => 4,
            Token::Plus | Token::Minus => 5,
            Token::Mult | Token::Div => 6,
            Token::StartP => -1,
            Token::EndP => -2,
        }
    }

    /// Unary operators take a single child.
    pub fn is_unary(self) -> bool {
        matches!(self, Token::Neg)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Mult => "*",
            Token::Div => "/",
            Token::And => "&&",
            Token::Or => "||",
            Token::Neg => "!",
            Token::StartP => "(",
            Token::EndP => ")",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::Great => ">",
            Token::Less => "<",
            Token::GreatEqual => ">=",
            Token::LessEqual => "<=",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
