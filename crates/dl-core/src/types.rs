use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub const STORE_SCHEMA_V1: &str = "dicelang-store.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Core,
    Global,
    #[serde(alias = "our")]
    Shared,
    #[serde(alias = "my")]
    Private,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Core, Tier::Global, Tier::Shared, Tier::Private];

    /// Keyword used in program text to select this tier.
    pub fn qualifier(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Global => "global",
            Self::Shared => "our",
            Self::Private => "my",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Global => "global",
            Self::Shared => "shared",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user: String,
    pub server: String,
}

impl Identity {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }
}

/// A concrete key space inside the variable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Core,
    Global,
    Shared { server: String },
    Private { server: String, user: String },
}

impl Namespace {
    pub fn resolve(tier: Tier, identity: &Identity) -> Self {
        match tier {
            Tier::Core => Self::Core,
            Tier::Global => Self::Global,
            Tier::Shared => Self::Shared {
                server: identity.server.clone(),
            },
            Tier::Private => Self::Private {
                server: identity.server.clone(),
                user: identity.user.clone(),
            },
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Self::Core => Tier::Core,
            Self::Global => Tier::Global,
            Self::Shared { .. } => Tier::Shared,
            Self::Private { .. } => Tier::Private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Gt,
    Ge,
    Eq,
    Ne,
    Le,
    Lt,
    Shl,
    Shr,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Rem,
    FloorDiv,
    Pow,
    Log,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::Xor => "xor",
            Self::And => "and",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Concat => "&",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::FloorDiv => "//",
            Self::Pow => "**",
            Self::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DieForm {
    Scalar,
    Vector,
}

/// Program tree handed over by the external parser.
///
/// Precedence is already encoded by the shape of the tree; `Group` is the
/// only pass-through level that survives parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Integer {
        value: i64,
    },
    Float {
        value: f64,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    List {
        #[serde(default)]
        items: Vec<Node>,
    },
    Identifier {
        name: String,
    },
    QualifiedIdentifier {
        tier: Tier,
        name: String,
    },
    Group {
        inner: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Dice {
        #[serde(default)]
        count: Option<Box<Node>>,
        sides: Box<Node>,
        form: DieForm,
    },
    Block {
        #[serde(default)]
        statements: Vec<Node>,
    },
    Assign {
        name: String,
        value: Box<Node>,
    },
    QualifiedAssign {
        tier: Tier,
        name: String,
        value: Box<Node>,
    },
    Delete {
        #[serde(default)]
        tier: Option<Tier>,
        name: String,
    },
    Print {
        value: Box<Node>,
    },
    If {
        condition: Box<Node>,
        #[serde(default)]
        then: Vec<Node>,
        #[serde(default)]
        otherwise: Vec<Node>,
    },
    While {
        condition: Box<Node>,
        #[serde(default)]
        body: Vec<Node>,
    },
    DoWhile {
        #[serde(default)]
        body: Vec<Node>,
        condition: Box<Node>,
    },
    Define {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        body: Vec<Node>,
        #[serde(default)]
        tier: Option<Tier>,
    },
    Call {
        name: String,
        #[serde(default)]
        tier: Option<Tier>,
        #[serde(default)]
        args: Vec<Node>,
    },
}

impl Node {
    pub fn int(value: i64) -> Self {
        Self::Integer { value }
    }

    pub fn float(value: f64) -> Self {
        Self::Float { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::Boolean { value }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    pub fn list(items: Vec<Node>) -> Self {
        Self::List { items }
    }

    pub fn group(inner: Node) -> Self {
        Self::Group {
            inner: Box::new(inner),
        }
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn dice(count: i64, sides: i64, form: DieForm) -> Self {
        Self::Dice {
            count: Some(Box::new(Self::int(count))),
            sides: Box::new(Self::int(sides)),
            form,
        }
    }

    pub fn block(statements: Vec<Node>) -> Self {
        Self::Block { statements }
    }

    pub fn assign(name: impl Into<String>, value: Node) -> Self {
        Self::Assign {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn qualified_assign(tier: Tier, name: impl Into<String>, value: Node) -> Self {
        Self::QualifiedAssign {
            tier,
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn print(value: Node) -> Self {
        Self::Print {
            value: Box::new(value),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Self::Call {
            name: name.into(),
            tier: None,
            args,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer { .. } => "integer",
            Self::Float { .. } => "float",
            Self::String { .. } => "string",
            Self::Boolean { .. } => "boolean",
            Self::List { .. } => "list",
            Self::Identifier { .. } => "identifier",
            Self::QualifiedIdentifier { .. } => "qualified_identifier",
            Self::Group { .. } => "group",
            Self::Binary { .. } => "binary",
            Self::Unary { .. } => "unary",
            Self::Dice { .. } => "dice",
            Self::Block { .. } => "block",
            Self::Assign { .. } => "assign",
            Self::QualifiedAssign { .. } => "qualified_assign",
            Self::Delete { .. } => "delete",
            Self::Print { .. } => "print",
            Self::If { .. } => "if",
            Self::While { .. } => "while",
            Self::DoWhile { .. } => "do_while",
            Self::Define { .. } => "define",
            Self::Call { .. } => "call",
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Durable image of every tier, as written by `save()` and `backup()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreImage {
    pub schema_version: String,
    #[serde(default)]
    pub core: BTreeMap<String, Value>,
    #[serde(default)]
    pub global: BTreeMap<String, Value>,
    /// server -> name -> value
    #[serde(default)]
    pub shared: BTreeMap<String, BTreeMap<String, Value>>,
    /// server -> user -> name -> value
    #[serde(default)]
    pub private: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
}

impl Default for StoreImage {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_V1.to_string(),
            core: BTreeMap::new(),
            global: BTreeMap::new(),
            shared: BTreeMap::new(),
            private: BTreeMap::new(),
        }
    }
}

impl StoreImage {
    pub fn entry_count(&self) -> usize {
        self.core.len()
            + self.global.len()
            + self.shared.values().map(BTreeMap::len).sum::<usize>()
            + self
                .private
                .values()
                .flat_map(BTreeMap::values)
                .map(BTreeMap::len)
                .sum::<usize>()
    }
}
