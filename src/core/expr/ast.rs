//! Typed syntax tree for template conditions.

/// A literal appearing in a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

/// The closed set of functions a condition may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Len,
    Min,
    Max,
    Sum,
    Round,
    Abs,
    Sorted,
    Int,
    Float,
}

impl Function {
    /// Resolve a call target against the whitelist. Anything not listed here
    /// is rejected by the parser.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" | "length" => Self::Len,
            "min" => Self::Min,
            "max" => Self::Max,
            "sum" => Self::Sum,
            "round" => Self::Round,
            "abs" => Self::Abs,
            "sorted" => Self::Sorted,
            "int" => Self::Int,
            "float" => Self::Float,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Round => "round",
            Self::Abs => "abs",
            Self::Sorted => "sorted",
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Bool {
        op: BoolOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a < b <= c`: every adjacent pair must hold.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    IfElse {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    /// Every variable name the expression reads.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Name(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::List(items) | Expr::Call { args: items, .. } => {
                for item in items {
                    item.collect_names(out);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { lhs, rhs, .. } | Expr::Bool { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Compare { first, rest } => {
                first.collect_names(out);
                for (_, e) in rest {
                    e.collect_names(out);
                }
            }
            Expr::IfElse {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_names(out);
                then.collect_names(out);
                otherwise.collect_names(out);
            }
            Expr::Index { target, index } => {
                target.collect_names(out);
                index.collect_names(out);
            }
        }
    }
}
