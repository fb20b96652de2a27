use crate::Type;
use ripple_utils::Id;
use smallvec::SmallVec;

/// What a reference resolves to. The emitter chases Wire and Node
/// references through the module netlist; every other kind is stateful (or
/// an interface) and is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Port,
    Wire,
    Node,
    Register,
    Instance,
    Memory,
}

/// Primitive operators. The `-w` variants carry the result width computed
/// by the width-wrap normalization and render identically to their plain
/// counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Addw,
    Sub,
    Subw,
    Mul,
    Div,
    Rem,
    Lt,
    Leq,
    Gt,
    Geq,
    Eq,
    Neq,
    Pad,
    AsUInt,
    AsSInt,
    AsClock,
    Shl,
    Shlw,
    Shr,
    Dshl,
    Dshlw,
    Dshr,
    Cvt,
    Neg,
    Not,
    And,
    Or,
    Xor,
    Andr,
    Orr,
    Xorr,
    Cat,
    Bits,
    Head,
    Tail,
}

impl std::fmt::Display for PrimOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use PrimOp::*;
        let s = match self {
            Add => "add",
            Addw => "addw",
            Sub => "sub",
            Subw => "subw",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Lt => "lt",
            Leq => "leq",
            Gt => "gt",
            Geq => "geq",
            Eq => "eq",
            Neq => "neq",
            Pad => "pad",
            AsUInt => "asUInt",
            AsSInt => "asSInt",
            AsClock => "asClock",
            Shl => "shl",
            Shlw => "shlw",
            Shr => "shr",
            Dshl => "dshl",
            Dshlw => "dshlw",
            Dshr => "dshr",
            Cvt => "cvt",
            Neg => "neg",
            Not => "not",
            And => "and",
            Or => "or",
            Xor => "xor",
            Andr => "andr",
            Orr => "orr",
            Xorr => "xorr",
            Cat => "cat",
            Bits => "bits",
            Head => "head",
            Tail => "tail",
        };
        f.write_str(s)
    }
}

/// An expression in low form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ref {
        name: Id,
        ty: Type,
        kind: RefKind,
    },
    SubField {
        expr: Box<Expr>,
        name: Id,
        ty: Type,
    },
    SubIndex {
        expr: Box<Expr>,
        index: u64,
        ty: Type,
    },
    SubAccess {
        expr: Box<Expr>,
        index: Box<Expr>,
        ty: Type,
    },
    UIntLit {
        value: u128,
        width: u64,
    },
    SIntLit {
        value: i128,
        width: u64,
    },
    Mux {
        cond: Box<Expr>,
        tval: Box<Expr>,
        fval: Box<Expr>,
        ty: Type,
    },
    ValidIf {
        cond: Box<Expr>,
        value: Box<Expr>,
        ty: Type,
    },
    DoPrim {
        op: PrimOp,
        args: Vec<Expr>,
        consts: SmallVec<[u64; 2]>,
        ty: Type,
    },
    /// Randomization draw introduced during emission; never produced by a
    /// frontend and never parsed back.
    Rand {
        width: u64,
    },
}

impl Expr {
    pub fn reference<S: Into<Id>>(name: S, ty: Type, kind: RefKind) -> Self {
        Expr::Ref {
            name: name.into(),
            ty,
            kind,
        }
    }

    pub fn uint(value: u128, width: u64) -> Self {
        Expr::UIntLit { value, width }
    }

    pub fn sint(value: i128, width: u64) -> Self {
        Expr::SIntLit { value, width }
    }

    pub fn ty(&self) -> Type {
        match self {
            Expr::Ref { ty, .. }
            | Expr::SubField { ty, .. }
            | Expr::SubIndex { ty, .. }
            | Expr::SubAccess { ty, .. }
            | Expr::Mux { ty, .. }
            | Expr::ValidIf { ty, .. }
            | Expr::DoPrim { ty, .. } => ty.clone(),
            Expr::UIntLit { width, .. } | Expr::Rand { width } => {
                Type::uint(*width)
            }
            Expr::SIntLit { width, .. } => Type::sint(*width),
        }
    }

    pub fn width(&self) -> u64 {
        self.ty().width()
    }

    pub fn is_signed(&self) -> bool {
        self.ty().is_signed()
    }

    /// The kind of the root reference, if this expression is a reference
    /// path.
    pub fn kind(&self) -> Option<RefKind> {
        match self {
            Expr::Ref { kind, .. } => Some(*kind),
            Expr::SubField { expr, .. }
            | Expr::SubIndex { expr, .. }
            | Expr::SubAccess { expr, .. } => expr.kind(),
            _ => None,
        }
    }

    /// Rebuild this node with `f` applied to each direct child. Callers
    /// drive the recursion.
    pub fn map_children<F: FnMut(Expr) -> Expr>(self, f: &mut F) -> Expr {
        match self {
            Expr::SubField { expr, name, ty } => Expr::SubField {
                expr: Box::new(f(*expr)),
                name,
                ty,
            },
            Expr::SubIndex { expr, index, ty } => Expr::SubIndex {
                expr: Box::new(f(*expr)),
                index,
                ty,
            },
            Expr::SubAccess { expr, index, ty } => Expr::SubAccess {
                expr: Box::new(f(*expr)),
                index: Box::new(f(*index)),
                ty,
            },
            Expr::Mux {
                cond,
                tval,
                fval,
                ty,
            } => Expr::Mux {
                cond: Box::new(f(*cond)),
                tval: Box::new(f(*tval)),
                fval: Box::new(f(*fval)),
                ty,
            },
            Expr::ValidIf { cond, value, ty } => Expr::ValidIf {
                cond: Box::new(f(*cond)),
                value: Box::new(f(*value)),
                ty,
            },
            Expr::DoPrim {
                op,
                args,
                consts,
                ty,
            } => Expr::DoPrim {
                op,
                args: args.into_iter().map(f).collect(),
                consts,
                ty,
            },
            e @ (Expr::Ref { .. }
            | Expr::UIntLit { .. }
            | Expr::SIntLit { .. }
            | Expr::Rand { .. }) => e,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Ref { name, .. } => write!(f, "{}", name),
            Expr::SubField { expr, name, .. } => {
                write!(f, "{}.{}", expr, name)
            }
            Expr::SubIndex { expr, index, .. } => {
                write!(f, "{}[{}]", expr, index)
            }
            Expr::SubAccess { expr, index, .. } => {
                write!(f, "{}[{}]", expr, index)
            }
            Expr::UIntLit { value, width } => {
                write!(f, "UInt<{}>(\"h{:x}\")", width, value)
            }
            Expr::SIntLit { value, width } => {
                if *value < 0 {
                    write!(
                        f,
                        "SInt<{}>(\"h-{:x}\")",
                        width,
                        value.unsigned_abs()
                    )
                } else {
                    write!(f, "SInt<{}>(\"h{:x}\")", width, value)
                }
            }
            Expr::Mux {
                cond, tval, fval, ..
            } => write!(f, "mux({}, {}, {})", cond, tval, fval),
            Expr::ValidIf { cond, value, .. } => {
                write!(f, "validif({}, {})", cond, value)
            }
            Expr::DoPrim {
                op, args, consts, ..
            } => {
                write!(f, "{}(", op)?;
                let mut first = true;
                for a in args {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{}", a)?;
                }
                for c in consts {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Expr::Rand { width } => write!(f, "random({})", width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn port(name: &str, ty: Type) -> Expr {
        Expr::reference(name, ty, RefKind::Port)
    }

    #[test]
    fn reference_paths_serialize_dotted() {
        let m = Expr::reference("m", Type::uint(8), RefKind::Memory);
        let r = Expr::SubField {
            expr: Box::new(m),
            name: "r".into(),
            ty: Type::uint(0),
        };
        let addr = Expr::SubField {
            expr: Box::new(r),
            name: "addr".into(),
            ty: Type::uint(3),
        };
        assert_eq!(addr.to_string(), "m.r.addr");
        assert_eq!(addr.kind(), Some(RefKind::Memory));
    }

    #[test]
    fn literals_serialize_with_width_and_sign() {
        assert_eq!(Expr::uint(42, 8).to_string(), "UInt<8>(\"h2a\")");
        assert_eq!(Expr::sint(-3, 4).to_string(), "SInt<4>(\"h-3\")");
        assert_eq!(Expr::sint(3, 4).to_string(), "SInt<4>(\"h3\")");
    }

    #[test]
    fn primops_serialize_args_then_consts() {
        let e = Expr::DoPrim {
            op: PrimOp::Bits,
            args: vec![port("x", Type::uint(8))],
            consts: smallvec![7, 2],
            ty: Type::uint(6),
        };
        assert_eq!(e.to_string(), "bits(x, 7, 2)");
    }

    #[test]
    fn mux_carries_its_own_type() {
        let m = Expr::Mux {
            cond: Box::new(port("c", Type::uint(1))),
            tval: Box::new(port("a", Type::sint(4))),
            fval: Box::new(port("b", Type::sint(4))),
            ty: Type::sint(4),
        };
        assert!(m.is_signed());
        assert_eq!(m.to_string(), "mux(c, a, b)");
    }
}
