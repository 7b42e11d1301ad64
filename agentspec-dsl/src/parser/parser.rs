//! Recursive-descent parser for the AgentSpec DSL.

use super::ast::*;
use crate::lexer::{Token, TokenKind};
use agentspec_core::ParseError;

/// The keywords that may start a top-level statement. Used both to decide
/// how to dispatch and as the synchronization set for error recovery.
fn starts_statement(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Import
            | TokenKind::Prompt
            | TokenKind::Skill
            | TokenKind::Agent
            | TokenKind::Server
            | TokenKind::Client
            | TokenKind::Secret
            | TokenKind::Environment
            | TokenKind::Policy
            | TokenKind::Plugin
            | TokenKind::Type
            | TokenKind::Pipeline
            | TokenKind::Deploy
    )
}

/// Recover the keyword spelling of a token, for keywords that may double as
/// attribute names inside a resource block (e.g. `model`, `timeout`,
/// `type`). Distinguishing block-starters from attribute names is purely
/// positional: a `Type` token at statement level starts a `Type` resource, a
/// `Type` token after an attribute name starts a `type "string"` attribute.
fn keyword_spelling(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Package => "package",
        TokenKind::Version => "version",
        TokenKind::Lang => "lang",
        TokenKind::Import => "import",
        TokenKind::Prompt => "prompt",
        TokenKind::Skill => "skill",
        TokenKind::Agent => "agent",
        TokenKind::Deploy => "deploy",
        TokenKind::Target => "target",
        TokenKind::Pipeline => "pipeline",
        TokenKind::Step => "step",
        TokenKind::Type => "type",
        TokenKind::Server => "server",
        TokenKind::Client => "client",
        TokenKind::Secret => "secret",
        TokenKind::Environment => "environment",
        TokenKind::Policy => "policy",
        TokenKind::Plugin => "plugin",
        TokenKind::Tool => "tool",
        TokenKind::Delegate => "delegate",
        TokenKind::Uses => "uses",
        TokenKind::Model => "model",
        TokenKind::Input => "input",
        TokenKind::Output => "output",
        TokenKind::Description => "description",
        TokenKind::Content => "content",
        TokenKind::Variables => "variables",
        TokenKind::Default => "default",
        TokenKind::Required => "required",
        TokenKind::Enum => "enum",
        TokenKind::List => "list",
        TokenKind::Connects => "connects",
        TokenKind::Exposes => "exposes",
        TokenKind::Env => "env",
        TokenKind::Store => "store",
        TokenKind::Command => "command",
        TokenKind::Require => "require",
        TokenKind::Deny => "deny",
        TokenKind::Allow => "allow",
        TokenKind::To => "to",
        TokenKind::When => "when",
        TokenKind::From => "from",
        TokenKind::Transport => "transport",
        TokenKind::Url => "url",
        TokenKind::Auth => "auth",
        TokenKind::Args => "args",
        TokenKind::Metadata => "metadata",
        TokenKind::Strategy => "strategy",
        TokenKind::MaxTurns => "max_turns",
        TokenKind::Timeout => "timeout",
        TokenKind::TokenBudget => "token_budget",
        TokenKind::Temperature => "temperature",
        TokenKind::Stream => "stream",
        TokenKind::OnError => "on_error",
        TokenKind::MaxRetries => "max_retries",
        TokenKind::Fallback => "fallback",
        TokenKind::Parallel => "parallel",
        TokenKind::DependsOn => "depends_on",
        TokenKind::Health => "health",
        TokenKind::Autoscale => "autoscale",
        TokenKind::Resources => "resources",
        TokenKind::Memory => "memory",
        TokenKind::True => "true",
        TokenKind::False => "false",
        _ => return None,
    })
}

/// Parser for the AgentSpec DSL. Single-pass and recursive-descent; a
/// failure inside one top-level block is recorded and parsing resumes at
/// the next recognizable top-level keyword, so a whole file's errors
/// surface in one pass rather than one-error-and-abort.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: impl Into<String>) -> Self {
        Self {
            tokens,
            pos: 0,
            file: file.into(),
        }
    }

    /// Parse the whole file, returning whatever statements parsed
    /// successfully alongside every error encountered.
    pub fn parse(&mut self) -> (File, Vec<ParseError>) {
        let mut errors = Vec::new();

        let package = match self.parse_package_header() {
            Ok(p) => p,
            Err(e) => {
                errors.push(e);
                self.synchronize();
                PackageHeader {
                    name: String::new(),
                    version: String::new(),
                    lang: None,
                }
            }
        };

        let mut imports = Vec::new();
        let mut resources = Vec::new();

        while !self.is_at_end() {
            match &self.current().kind {
                TokenKind::Import => match self.parse_import() {
                    Ok(stmt) => imports.push(stmt),
                    Err(e) => {
                        errors.push(e);
                        self.synchronize();
                    }
                },
                kind if starts_statement(kind) => match self.parse_resource_block() {
                    Ok(block) => resources.push(block),
                    Err(e) => {
                        errors.push(e);
                        self.synchronize();
                    }
                },
                _ => {
                    errors.push(self.error("expected an import or a resource block"));
                    self.synchronize();
                }
            }
        }

        (
            File {
                package,
                imports,
                resources,
            },
            errors,
        )
    }

    fn parse_package_header(&mut self) -> Result<PackageHeader, ParseError> {
        self.expect(TokenKind::Package)?;
        let name = self.expect_string()?;
        self.expect(TokenKind::Version)?;
        let version = self.expect_string()?;
        let lang = if self.check(&TokenKind::Lang) {
            self.advance();
            Some(self.expect_string()?)
        } else {
            None
        };
        if lang.as_deref() == Some("1.0") {
            return Err(self.error_with_hint(
                "'lang \"1.0\"' files must be migrated",
                "bump the lang declaration to a supported version",
            ));
        }
        Ok(PackageHeader { name, version, lang })
    }

    fn parse_import(&mut self) -> Result<ImportStmt, ParseError> {
        let (line, column) = self.position();
        self.expect(TokenKind::Import)?;
        let path = self.expect_string()?;
        Ok(ImportStmt { path, line, column })
    }

    fn parse_resource_block(&mut self) -> Result<ResourceBlock, ParseError> {
        let (line, column) = self.position();
        let kind = match &self.current().kind {
            TokenKind::Deploy => {
                self.advance();
                self.expect(TokenKind::Target)?;
                BlockKind::DeployTarget
            }
            TokenKind::Prompt => {
                self.advance();
                BlockKind::Prompt
            }
            TokenKind::Skill => {
                self.advance();
                BlockKind::Skill
            }
            TokenKind::Agent => {
                self.advance();
                BlockKind::Agent
            }
            TokenKind::Server => {
                self.advance();
                BlockKind::Server
            }
            TokenKind::Client => {
                self.advance();
                BlockKind::Client
            }
            TokenKind::Secret => {
                self.advance();
                BlockKind::Secret
            }
            TokenKind::Environment => {
                self.advance();
                BlockKind::Environment
            }
            TokenKind::Policy => {
                self.advance();
                BlockKind::Policy
            }
            TokenKind::Plugin => {
                self.advance();
                BlockKind::Plugin
            }
            TokenKind::Type => {
                self.advance();
                BlockKind::Type
            }
            TokenKind::Pipeline => {
                self.advance();
                BlockKind::Pipeline
            }
            _ => return Err(self.error("expected a resource kind keyword")),
        };

        let name = self.expect_string()?;
        let attributes = self.parse_block()?;

        if matches!(kind, BlockKind::Skill) {
            let has_input = attributes
                .iter()
                .any(|a| a.name == "input" && matches!(a.value, Value::Block(_)));
            let has_output = attributes
                .iter()
                .any(|a| a.name == "output" && matches!(a.value, Value::Block(_)));
            if !has_input {
                return Err(ParseError {
                    file: self.file.clone(),
                    line,
                    column,
                    message: format!("skill '{}' is missing a required input block", name),
                    hint: Some("add an `input { ... }` block".to_string()),
                });
            }
            if !has_output {
                return Err(ParseError {
                    file: self.file.clone(),
                    line,
                    column,
                    message: format!("skill '{}' is missing a required output block", name),
                    hint: Some("add an `output { ... }` block".to_string()),
                });
            }
        }

        Ok(ResourceBlock {
            kind,
            name,
            attributes,
            line,
            column,
        })
    }

    /// `"{" Attribute* "}"`.
    fn parse_block(&mut self) -> Result<Vec<Attribute>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut attributes = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            attributes.push(self.parse_attribute()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(attributes)
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let (line, column) = self.position();
        match &self.current().kind {
            TokenKind::Uses => self.parse_reference_attr("uses", false, line, column),
            TokenKind::Connects => self.parse_reference_attr("connects", true, line, column),
            TokenKind::Exposes => self.parse_reference_attr("exposes", false, line, column),
            TokenKind::Delegate => self.parse_reference_attr("delegate", true, line, column),
            _ => {
                let name = self.expect_attribute_name()?;
                let value = if self.check(&TokenKind::LBrace) {
                    Value::Block(self.parse_block()?)
                } else if matches!(self.current().kind, TokenKind::String(_))
                    && matches!(self.peek(1).kind, TokenKind::LBrace)
                {
                    let label = self.expect_string()?;
                    let attrs = self.parse_block()?;
                    Value::NamedBlock(label, attrs)
                } else {
                    self.parse_value()?
                };
                Ok(Attribute {
                    name,
                    value,
                    line,
                    column,
                })
            }
        }
    }

    /// Reference attributes thread a kind + string-literal name through a
    /// fixed-shape grammar: `uses prompt "x"`, `connects to server "x"`,
    /// `exposes skill "x"`, `delegate to agent "x"`. Stored as a bare
    /// `"<Kind>/<name>"` string, resolved to a full FQN at validation time.
    fn parse_reference_attr(
        &mut self,
        name: &str,
        expects_to: bool,
        line: usize,
        column: usize,
    ) -> Result<Attribute, ParseError> {
        self.advance();
        if expects_to {
            self.expect(TokenKind::To)?;
        }
        let kind = self.expect_reference_kind()?;
        let target = self.expect_string()?;
        Ok(Attribute {
            name: name.to_string(),
            value: Value::Str(format!("{}/{}", kind, target)),
            line,
            column,
        })
    }

    fn expect_reference_kind(&mut self) -> Result<&'static str, ParseError> {
        let kind = match &self.current().kind {
            TokenKind::Prompt => "Prompt",
            TokenKind::Skill => "Skill",
            TokenKind::Agent => "Agent",
            TokenKind::Server => "Server",
            TokenKind::Client => "Client",
            _ => return Err(self.error("expected a resource kind (prompt, skill, agent, server, client)")),
        };
        self.advance();
        Ok(kind)
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Value::Str(s))
            }
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Value::Num(n))
            }
            TokenKind::True => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => Ok(Value::Block(self.parse_block()?)),
            _ => Err(self.error("expected a string, number, boolean, list, or block value")),
        }
    }

    fn parse_list(&mut self) -> Result<Value, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            items.push(self.parse_value()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Value::List(items))
    }

    fn expect_attribute_name(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => {
                if let Some(spelling) = keyword_spelling(other) {
                    self.advance();
                    Ok(spelling.to_string())
                } else {
                    Err(self.error("expected an attribute name"))
                }
            }
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("expected a string literal")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.current().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    /// Look `offset` tokens ahead without consuming. Clamped to the final
    /// token (always `Eof`), so peeking past the end is safe.
    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn position(&self) -> (usize, usize) {
        (self.current().span.line, self.current().span.column)
    }

    fn error(&self, message: &str) -> ParseError {
        let (line, column) = self.position();
        ParseError {
            file: self.file.clone(),
            line,
            column,
            message: message.to_string(),
            hint: None,
        }
    }

    fn error_with_hint(&self, message: &str, hint: &str) -> ParseError {
        let (line, column) = self.position();
        ParseError {
            file: self.file.clone(),
            line,
            column,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    /// Skip tokens until one starts a recognizable top-level statement, or
    /// EOF. This is what lets a single parse pass report every top-level
    /// error instead of aborting on the first.
    fn synchronize(&mut self) {
        while !self.is_at_end() && !starts_statement(&self.current().kind) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (File, Vec<ParseError>) {
        let tokens = Lexer::new(source).tokenize();
        Parser::new(tokens, "test.ias").parse()
    }

    #[test]
    fn parses_minimal_package_and_prompt() {
        let (file, errors) = parse(
            r#"
            package "acme" version "1.0.0"
            prompt "greeting" {
                content "hello"
            }
            "#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(file.package.name, "acme");
        assert_eq!(file.resources.len(), 1);
        assert_eq!(file.resources[0].name, "greeting");
    }

    #[test]
    fn rejects_lang_one_point_zero() {
        let (_, errors) = parse(r#"package "acme" version "1.0.0" lang "1.0""#);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("1.0"));
    }

    #[test]
    fn skill_without_input_block_is_an_error() {
        let (_, errors) = parse(
            r#"
            package "acme" version "1.0.0"
            skill "s" {
                output { }
            }
            "#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("input"));
    }

    #[test]
    fn parses_reference_attributes() {
        let (file, errors) = parse(
            r#"
            package "acme" version "1.0.0"
            agent "a" {
                uses prompt "greeting"
            }
            "#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let attr = &file.resources[0].attributes[0];
        assert_eq!(attr.name, "uses");
        assert_eq!(attr.value, Value::Str("Prompt/greeting".to_string()));
    }

    #[test]
    fn recovers_after_malformed_block_and_reports_both_errors() {
        let (file, errors) = parse(
            r#"
            package "acme" version "1.0.0"
            prompt "broken" {
                content
            }
            prompt "ok" {
                content "fine"
            }
            "#,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(file.resources.len(), 1);
        assert_eq!(file.resources[0].name, "ok");
    }

    #[test]
    fn parses_nested_list_and_block_values() {
        let (file, errors) = parse(
            r#"
            package "acme" version "1.0.0"
            pipeline "p" {
                step "one" {
                    depends_on []
                }
                step "two" {
                    depends_on ["one"]
                }
            }
            "#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let steps: Vec<_> = file.resources[0]
            .attributes
            .iter()
            .filter(|a| a.name == "step")
            .collect();
        assert_eq!(steps.len(), 2);
    }
}
