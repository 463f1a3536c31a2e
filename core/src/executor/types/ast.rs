//! Abstract Syntax Tree node types
//!
//! Trees arrive from the front end as JSON and are never mutated by the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Statement AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    If {
        condition: Expr,
        #[serde(rename = "thenBody")]
        then_body: Vec<Stmt>,
        #[serde(rename = "elseBody", default)]
        else_body: Option<Vec<Stmt>>,
    },
    For {
        item: String,
        collection: Expr,
        body: Vec<Stmt>,
    },
    Expression {
        expression: Expr,
    },
}

impl Stmt {
    /// Short label used when reporting which statement failed
    pub fn label(&self) -> String {
        match self {
            Stmt::Let { name, .. } => format!("let {}", name),
            Stmt::Assign { name, .. } => format!("assign {}", name),
            Stmt::Return { .. } => "return".to_string(),
            Stmt::If { .. } => "if".to_string(),
            Stmt::For { item, .. } => format!("for {}", item),
            Stmt::Expression { .. } => "expression".to_string(),
        }
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: JsonValue,
    },
    Identifier {
        name: String,
    },
    Binary {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    Object {
        properties: Vec<Property>,
    },
    Array {
        elements: Vec<Expr>,
    },
}

/// One `key: value` entry of an object expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "-")]
    Neg,
}

/* ===================== Builders ===================== */

// Terse constructors for hosts and tests that build trees in code.
impl Expr {
    pub fn lit(value: impl Into<JsonValue>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    pub fn call(callee: Expr, arguments: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn binary(operator: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn object<K: Into<String>>(properties: Vec<(K, Expr)>) -> Self {
        Expr::Object {
            properties: properties
                .into_iter()
                .map(|(key, value)| Property {
                    key: key.into(),
                    value,
                })
                .collect(),
        }
    }
}
