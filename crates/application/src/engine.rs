//! 模板引擎
//!
//! 在展开之前对模板文档做占位符替换。`{{ EXPR }}` 支持变量引用、
//! 整数算术、字符串拼接和两个标识符生成器：
//!
//! - `UUID(label)`: label 在本场景内的稳定 id（场景 id 派生的
//!   命名空间下的 UUIDv5）
//! - `SHORT_UUID(label)`: 同一 id 截断成 8 个十六进制字符
//! - `UUID(label + "." + n)`: 索引形式，返回 label 的 id 加 `.n`
//!   后缀，与展开器给复制任务分配的 id 一致
//!
//! 同一场景内对同一 label 的两次调用返回同一个值；不同场景之间
//! 一定不同。整个替换对 (模板, 参数, 场景 id) 三元组是确定性的。

use std::collections::{BTreeMap, HashMap};

use serde_yaml::Value as YamlValue;
use uuid::Uuid;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

const MAX_ID_ATTEMPTS: u32 = 3;

pub struct TemplateEngine {
    namespace: Uuid,
    variables: BTreeMap<String, serde_json::Value>,
    /// (form, label) -> 生成的 id
    ids: HashMap<(IdForm, String), String>,
    /// 生成的 id -> label，用于冲突检测
    claimed: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdForm {
    Full,
    Short,
}

#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Int(i64),
    Str(String),
}

impl EvalValue {
    fn render(&self) -> String {
        match self {
            EvalValue::Int(n) => n.to_string(),
            EvalValue::Str(s) => s.clone(),
        }
    }
}

impl TemplateEngine {
    pub fn new(scenario_id: &str, variables: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, scenario_id.as_bytes()),
            variables,
            ids: HashMap::new(),
            claimed: HashMap::new(),
        }
    }

    /// 递归替换一棵 YAML 值树。恰好由一个占位符构成的字符串取表达式
    /// 的类型值（`count: "{{ N_SLIDES }}"` 会落成整数），其余字符串做
    /// 文本插值。
    pub fn render(&mut self, value: &YamlValue) -> OrchestratorResult<YamlValue> {
        match value {
            YamlValue::String(s) => self.render_string(s),
            YamlValue::Sequence(seq) => {
                let mut out = Vec::with_capacity(seq.len());
                for item in seq {
                    out.push(self.render(item)?);
                }
                Ok(YamlValue::Sequence(out))
            }
            YamlValue::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.render(item)?);
                }
                Ok(YamlValue::Mapping(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn render_string(&mut self, input: &str) -> OrchestratorResult<YamlValue> {
        if !input.contains("{{") {
            return Ok(YamlValue::String(input.to_string()));
        }

        let trimmed = input.trim();
        if let Some(inner) = single_placeholder(trimmed) {
            return Ok(match self.eval(inner)? {
                EvalValue::Int(n) => YamlValue::Number(n.into()),
                EvalValue::Str(s) => YamlValue::String(s),
            });
        }

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                OrchestratorError::invalid_template(format!("unclosed placeholder in: {input}"))
            })?;
            out.push_str(&self.eval(&after[..end])?.render());
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(YamlValue::String(out))
    }

    fn eval(&mut self, expr: &str) -> OrchestratorResult<EvalValue> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            engine: self,
            tokens,
            pos: 0,
            expr,
        };
        let value = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(OrchestratorError::invalid_template(format!(
                "trailing input in expression: {expr}"
            )));
        }
        Ok(value)
    }

    fn variable(&self, name: &str) -> OrchestratorResult<EvalValue> {
        let value = self.variables.get(name).ok_or_else(|| {
            OrchestratorError::invalid_template(format!("undefined variable: {name}"))
        })?;
        match value {
            serde_json::Value::Number(n) if n.is_i64() => Ok(EvalValue::Int(n.as_i64().unwrap())),
            serde_json::Value::Number(n) => Ok(EvalValue::Str(n.to_string())),
            serde_json::Value::String(s) => Ok(EvalValue::Str(s.clone())),
            serde_json::Value::Bool(b) => Ok(EvalValue::Str(b.to_string())),
            other => Err(OrchestratorError::invalid_template(format!(
                "variable {name} has unsupported type: {other}"
            ))),
        }
    }

    /// 标识符生成。索引形式 `label.N` 解析成基础 label 的 id 加后缀。
    fn generate_id(&mut self, label: &str, form: IdForm) -> OrchestratorResult<String> {
        if let Some((base, index)) = split_indexed(label) {
            let base_id = self.generate_id(base, form)?;
            return Ok(format!("{base_id}.{index}"));
        }

        let key = (form, label.to_string());
        if let Some(id) = self.ids.get(&key) {
            return Ok(id.clone());
        }

        for attempt in 0..MAX_ID_ATTEMPTS {
            let salted = if attempt == 0 {
                label.to_string()
            } else {
                format!("{label}#{attempt}")
            };
            let uuid = Uuid::new_v5(&self.namespace, salted.as_bytes());
            let id = match form {
                IdForm::Full => uuid.to_string(),
                IdForm::Short => uuid.simple().to_string()[..8].to_string(),
            };
            if self.claimed.contains_key(&id) {
                continue;
            }
            self.claimed.insert(id.clone(), label.to_string());
            self.ids.insert(key, id.clone());
            return Ok(id);
        }

        Err(OrchestratorError::IdCollision {
            label: label.to_string(),
        })
    }
}

/// 整个字符串恰好是一个占位符时返回内部表达式。
fn single_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner)
}

/// `label.N` 形式拆成 (label, N)。
fn split_indexed(label: &str) -> Option<(&str, &str)> {
    let (base, index) = label.rsplit_once('.')?;
    if base.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, index))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> OrchestratorResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j == bytes.len() {
                    return Err(OrchestratorError::invalid_template(format!(
                        "unterminated string literal in expression: {expr}"
                    )));
                }
                tokens.push(Token::Str(expr[start..j].to_string()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let number: i64 = expr[start..i].parse().map_err(|_| {
                    OrchestratorError::invalid_template(format!(
                        "integer literal out of range in expression: {expr}"
                    ))
                })?;
                tokens.push(Token::Int(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(expr[start..i].to_string()));
            }
            other => {
                return Err(OrchestratorError::invalid_template(format!(
                    "unexpected character '{other}' in expression: {expr}"
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    engine: &'a mut TemplateEngine,
    tokens: Vec<Token>,
    pos: usize,
    expr: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, msg: &str) -> OrchestratorError {
        OrchestratorError::invalid_template(format!("{msg} in expression: {}", self.expr))
    }

    fn parse_expr(&mut self) -> OrchestratorResult<EvalValue> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Plus => Token::Plus,
                Token::Minus => Token::Minus,
                _ => break,
            };
            self.next();
            let right = self.parse_term()?;
            left = match (op, left, right) {
                (Token::Plus, EvalValue::Int(a), EvalValue::Int(b)) => EvalValue::Int(a + b),
                // 任一侧是字符串时 + 退化为拼接。
                (Token::Plus, a, b) => EvalValue::Str(format!("{}{}", a.render(), b.render())),
                (Token::Minus, EvalValue::Int(a), EvalValue::Int(b)) => EvalValue::Int(a - b),
                (Token::Minus, _, _) => {
                    return Err(self.error("'-' requires integer operands"));
                }
                _ => unreachable!(),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> OrchestratorResult<EvalValue> {
        let mut left = self.parse_factor()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Star => Token::Star,
                Token::Slash => Token::Slash,
                _ => break,
            };
            self.next();
            let right = self.parse_factor()?;
            left = match (op, left, right) {
                (Token::Star, EvalValue::Int(a), EvalValue::Int(b)) => EvalValue::Int(a * b),
                (Token::Slash, EvalValue::Int(a), EvalValue::Int(b)) => {
                    if b == 0 {
                        return Err(self.error("division by zero"));
                    }
                    EvalValue::Int(a / b)
                }
                _ => return Err(self.error("'*' and '/' require integer operands")),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> OrchestratorResult<EvalValue> {
        match self.next() {
            Some(Token::Int(n)) => Ok(EvalValue::Int(n)),
            Some(Token::Str(s)) => Ok(EvalValue::Str(s)),
            Some(Token::Minus) => match self.parse_factor()? {
                EvalValue::Int(n) => Ok(EvalValue::Int(-n)),
                EvalValue::Str(_) => Err(self.error("unary '-' requires an integer")),
            },
            Some(Token::LParen) => {
                let value = self.parse_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.next();
                    let arg = self.parse_expr()?;
                    match self.next() {
                        Some(Token::RParen) => {}
                        _ => return Err(self.error("expected ')' after generator argument")),
                    }
                    let label = arg.render();
                    match name.as_str() {
                        "UUID" => self
                            .engine
                            .generate_id(&label, IdForm::Full)
                            .map(EvalValue::Str),
                        "SHORT_UUID" => self
                            .engine
                            .generate_id(&label, IdForm::Short)
                            .map(EvalValue::Str),
                        _ => Err(self.error(&format!("unknown generator: {name}"))),
                    }
                } else {
                    self.engine.variable(&name)
                }
            }
            _ => Err(self.error("unexpected end of expression")),
        }
    }
}
