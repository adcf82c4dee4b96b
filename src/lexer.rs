//! MiniJava Lexer
//!
//! Tokenizes MiniJava source. Keywords are lexed as identifiers and
//! classified afterwards with [`Keyword::from_str`].

use logos::Logos;

use crate::error::{CompileError, Result, Span};

/// MiniJava tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
pub enum Token {
    // === Literals ===

    /// Decimal integer literal; range is checked by the parser
    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Integer(i64),

    // === Identifiers and Keywords ===

    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    /// `System.out.println` is a single token in MiniJava
    #[token("System.out.println")]
    Println,

    // === Operators ===

    #[token("&&")]
    AndAnd,

    #[token("<")]
    Lt,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("!")]
    Bang,

    #[token("=")]
    Assign,

    // === Delimiters ===

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(".")]
    Dot,
}

impl Token {
    /// Check if this identifier is a reserved word
    pub fn is_keyword(&self) -> bool {
        self.as_keyword().is_some()
    }

    /// Get keyword if this is one
    pub fn as_keyword(&self) -> Option<Keyword> {
        match self {
            Token::Identifier(name) => Keyword::from_str(name),
            _ => None,
        }
    }
}

/// MiniJava reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    // Declarations
    Class, Extends, Public, Static, Void,

    // Types
    Int, Boolean,

    // Statements
    If, Else, While, Return,

    // Expressions
    True, False, This, New,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "class" => Some(Self::Class),
            "extends" => Some(Self::Extends),
            "public" => Some(Self::Public),
            "static" => Some(Self::Static),
            "void" => Some(Self::Void),

            "int" => Some(Self::Int),
            "boolean" => Some(Self::Boolean),

            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "while" => Some(Self::While),
            "return" => Some(Self::Return),

            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "this" => Some(Self::This),
            "new" => Some(Self::New),

            _ => None,
        }
    }
}

/// Spanned token for error reporting
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut tokens = Vec::new();
    let lexer = Token::lexer(source);

    for (result, span) in lexer.spanned() {
        match result {
            Ok(token) => {
                tokens.push(SpannedToken {
                    token,
                    span: span.into(),
                });
            }
            Err(()) => {
                return Err(CompileError::lexer(
                    span.clone(),
                    format!("Unexpected input '{}'", &source[span]),
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tokens() {
        let tokens = tokenize("int x;").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].token.as_keyword(), Some(Keyword::Int));
        assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "x"));
        assert!(matches!(&tokens[2].token, Token::Semicolon));
    }

    #[test]
    fn test_println_is_one_token() {
        let tokens = tokenize("System.out.println(1);").unwrap();
        assert!(matches!(&tokens[0].token, Token::Println));
        assert!(matches!(&tokens[2].token, Token::Integer(1)));
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a && b < c + d - e * !f").unwrap();
        assert!(matches!(&tokens[1].token, Token::AndAnd));
        assert!(matches!(&tokens[3].token, Token::Lt));
        assert!(matches!(&tokens[5].token, Token::Plus));
        assert!(matches!(&tokens[7].token, Token::Minus));
        assert!(matches!(&tokens[9].token, Token::Star));
        assert!(matches!(&tokens[10].token, Token::Bang));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("x // trailing\n/* block\n * comment */ y").unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "y"));
    }

    #[test]
    fn test_block_comments_with_stars() {
        for source in ["/* ab */ x", "/* a*b */ x", "/** doc\n * x */ x", "/**/ x", "/* ** */ x"] {
            let tokens = tokenize(source).unwrap();
            assert_eq!(tokens.len(), 1, "{:?}", source);
            assert!(matches!(&tokens[0].token, Token::Identifier(s) if s == "x"));
        }
    }

    #[test]
    fn test_block_comment_ends_at_first_close() {
        let tokens = tokenize("a /* one */ b /* two */ c").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[1].token, Token::Identifier(s) if s == "b"));
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let err = tokenize("x /* never closed").unwrap_err();
        assert!(matches!(err, CompileError::Lexer { span, .. } if span.start == 2));
    }

    #[test]
    fn test_length_is_not_reserved() {
        let tokens = tokenize("length main String").unwrap();
        assert!(tokens.iter().all(|t| !t.token.is_keyword()));
    }

    #[test]
    fn test_unknown_character_is_an_error() {
        let err = tokenize("x = 1 # 2;").unwrap_err();
        assert!(matches!(err, CompileError::Lexer { span, .. } if span.start == 6));
    }
}
