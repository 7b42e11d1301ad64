//! Lexer token types

// ============================================================================
// LEXER TYPES
// ============================================================================

/// Token kinds for the AgentSpec DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Structural keywords
    Package,
    Version,
    Lang,
    Import,

    // Resource-kind keywords
    Prompt,
    Skill,
    Agent,
    Deploy,
    Target,
    Pipeline,
    Step,
    Type,
    Server,
    Client,
    Secret,
    Environment,
    Policy,
    Plugin,

    // Attribute keywords
    Tool,
    Delegate,
    Uses,
    Model,
    Input,
    Output,
    Description,
    Content,
    Variables,
    Default,
    Required,
    Enum,
    List,
    Connects,
    Exposes,
    Env,
    Store,
    Command,
    Require,
    Deny,
    Allow,
    To,
    When,
    From,
    Transport,
    Url,
    Auth,
    Args,
    Metadata,
    Strategy,
    MaxTurns,
    Timeout,
    TokenBudget,
    Temperature,
    Stream,
    OnError,
    MaxRetries,
    Fallback,
    Parallel,
    DependsOn,
    Health,
    Autoscale,
    Resources,
    Memory,

    // Literal keywords
    True,
    False,

    // Delimiters
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Dot,

    // Literals
    String(String),
    Number(f64),
    Identifier(String),

    // Special
    Eof,
    Error(String),
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Look up the keyword a bare identifier spells, if any. The DSL's keyword
/// table is fixed and closed; anything not in this table lexes as a plain
/// identifier.
pub fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "package" => TokenKind::Package,
        "version" => TokenKind::Version,
        "lang" => TokenKind::Lang,
        "import" => TokenKind::Import,
        "prompt" => TokenKind::Prompt,
        "skill" => TokenKind::Skill,
        "agent" => TokenKind::Agent,
        "deploy" => TokenKind::Deploy,
        "target" => TokenKind::Target,
        "pipeline" => TokenKind::Pipeline,
        "step" => TokenKind::Step,
        "type" => TokenKind::Type,
        "server" => TokenKind::Server,
        "client" => TokenKind::Client,
        "secret" => TokenKind::Secret,
        "environment" => TokenKind::Environment,
        "policy" => TokenKind::Policy,
        "plugin" => TokenKind::Plugin,
        "tool" => TokenKind::Tool,
        "delegate" => TokenKind::Delegate,
        "uses" => TokenKind::Uses,
        "model" => TokenKind::Model,
        "input" => TokenKind::Input,
        "output" => TokenKind::Output,
        "description" => TokenKind::Description,
        "content" => TokenKind::Content,
        "variables" => TokenKind::Variables,
        "default" => TokenKind::Default,
        "required" => TokenKind::Required,
        "enum" => TokenKind::Enum,
        "list" => TokenKind::List,
        "connects" => TokenKind::Connects,
        "exposes" => TokenKind::Exposes,
        "env" => TokenKind::Env,
        "store" => TokenKind::Store,
        "command" => TokenKind::Command,
        "require" => TokenKind::Require,
        "deny" => TokenKind::Deny,
        "allow" => TokenKind::Allow,
        "to" => TokenKind::To,
        "when" => TokenKind::When,
        "from" => TokenKind::From,
        "transport" => TokenKind::Transport,
        "url" => TokenKind::Url,
        "auth" => TokenKind::Auth,
        "args" => TokenKind::Args,
        "metadata" => TokenKind::Metadata,
        "strategy" => TokenKind::Strategy,
        "max_turns" => TokenKind::MaxTurns,
        "timeout" => TokenKind::Timeout,
        "token_budget" => TokenKind::TokenBudget,
        "temperature" => TokenKind::Temperature,
        "stream" => TokenKind::Stream,
        "on_error" => TokenKind::OnError,
        "max_retries" => TokenKind::MaxRetries,
        "fallback" => TokenKind::Fallback,
        "parallel" => TokenKind::Parallel,
        "depends_on" => TokenKind::DependsOn,
        "health" => TokenKind::Health,
        "autoscale" => TokenKind::Autoscale,
        "resources" => TokenKind::Resources,
        "memory" => TokenKind::Memory,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    })
}
