//! Text serializer for the IR. The output is the circuit surface syntax at
//! whatever normal form the circuit is currently in; serializing and
//! re-parsing yields a structurally equal circuit.
use crate::{Circuit, Direction, Memory, Module, Param, ParamValue, Port, Stmt};
use itertools::Itertools;
use std::io;

/// Escape a string for inclusion in a double-quoted literal. Used both for
/// the IR surface syntax and for Verilog string literals; printf-style `%`
/// specifiers pass through untouched.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Serialize the whole circuit.
    pub fn write_circuit<F: io::Write>(
        circuit: &Circuit,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(f, "circuit {} :", circuit.main)?;
        for module in &circuit.modules {
            Self::write_module(module, 2, f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    /// Serialize one module at the given indentation.
    pub fn write_module<F: io::Write>(
        module: &Module,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        match module {
            Module::Internal { name, ports, body } => {
                writeln!(f, "{}module {} :", " ".repeat(indent), name)?;
                for port in ports {
                    Self::write_port(port, indent + 2, f)?;
                }
                let mut rendered = Vec::new();
                Self::write_stmt(body, indent + 2, &mut rendered)?;
                if !rendered.is_empty() {
                    writeln!(f)?;
                    f.write_all(&rendered)?;
                }
                Ok(())
            }
            Module::External {
                name,
                ports,
                defname,
                params,
            } => {
                writeln!(f, "{}extmodule {} :", " ".repeat(indent), name)?;
                for port in ports {
                    Self::write_port(port, indent + 2, f)?;
                }
                writeln!(f, "{}defname = {}", " ".repeat(indent + 2), defname)?;
                for param in params {
                    Self::write_param(param, indent + 2, f)?;
                }
                Ok(())
            }
        }
    }

    fn write_port<F: io::Write>(
        port: &Port,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let dir = match port.direction {
            Direction::Input => "input",
            Direction::Output => "output",
        };
        writeln!(
            f,
            "{}{} {} : {}",
            " ".repeat(indent),
            dir,
            port.name,
            port.ty
        )
    }

    fn write_param<F: io::Write>(
        param: &Param,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let ind = " ".repeat(indent);
        match &param.value {
            ParamValue::Int(v) => {
                writeln!(f, "{}parameter {} = {}", ind, param.name, v)
            }
            ParamValue::String(s) => writeln!(
                f,
                "{}parameter {} = \"{}\"",
                ind,
                param.name,
                escape_string(s)
            ),
            ParamValue::Raw(s) => {
                writeln!(f, "{}parameter {} = {}", ind, param.name, s)
            }
        }
    }

    /// Serialize one statement. Blocks flatten into their children at the
    /// same indentation; everything else is a single line except memories.
    pub fn write_stmt<F: io::Write>(
        stmt: &Stmt,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let ind = " ".repeat(indent);
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    Self::write_stmt(s, indent, f)?;
                }
                Ok(())
            }
            Stmt::Connect { loc, rhs } => {
                writeln!(f, "{}{} <= {}", ind, loc, rhs)
            }
            Stmt::IsInvalid { expr } => writeln!(f, "{}{} is invalid", ind, expr),
            Stmt::DefNode { name, value } => {
                writeln!(f, "{}node {} = {}", ind, name, value)
            }
            Stmt::DefWire { name, ty } => {
                writeln!(f, "{}wire {} : {}", ind, name, ty)
            }
            Stmt::DefRegister {
                name,
                ty,
                clock,
                reset,
                init,
            } => writeln!(
                f,
                "{}reg {} : {}, {} with : (reset => ({}, {}))",
                ind, name, ty, clock, reset, init
            ),
            Stmt::DefMemory(mem) => Self::write_memory(mem, indent, f),
            Stmt::DefInstance { name, module }
            | Stmt::DefInstanceConnected { name, module, .. }
            | Stmt::DefInstanceConnector { name, module, .. } => {
                writeln!(f, "{}inst {} of {}", ind, name, module)
            }
            Stmt::Attach(exprs) => {
                writeln!(f, "{}attach({})", ind, exprs.iter().join(", "))
            }
            Stmt::Stop { clock, en, code } => {
                writeln!(f, "{}stop({}, {}, {})", ind, clock, en, code)
            }
            Stmt::Print {
                clock,
                en,
                string,
                args,
            } => {
                write!(
                    f,
                    "{}printf({}, {}, \"{}\"",
                    ind,
                    clock,
                    en,
                    escape_string(string)
                )?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                writeln!(f, ")")
            }
            Stmt::Skip => writeln!(f, "{}skip", ind),
        }
    }

    fn write_memory<F: io::Write>(
        mem: &Memory,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let ind = " ".repeat(indent);
        let sub = " ".repeat(indent + 2);
        writeln!(f, "{}mem {} :", ind, mem.name)?;
        writeln!(f, "{}data-type => {}", sub, mem.data_type)?;
        writeln!(f, "{}depth => {}", sub, mem.depth)?;
        writeln!(f, "{}read-latency => {}", sub, mem.read_latency)?;
        writeln!(f, "{}write-latency => {}", sub, mem.write_latency)?;
        for r in &mem.readers {
            writeln!(f, "{}reader => {}", sub, r)?;
        }
        for w in &mem.writers {
            writeln!(f, "{}writer => {}", sub, w)?;
        }
        for rw in &mem.readwriters {
            writeln!(f, "{}readwriter => {}", sub, rw)?;
        }
        Ok(())
    }

    /// Convenience wrapper returning the serialized circuit as a string.
    pub fn circuit_string(circuit: &Circuit) -> String {
        let mut buf = Vec::new();
        Self::write_circuit(circuit, &mut buf)
            .expect("writing to an in-memory buffer cannot fail");
        String::from_utf8(buf).expect("serializer emits UTF-8 only")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Expr, Port, PrimOp, RefKind, Type};
    use smallvec::smallvec;

    fn counter() -> Circuit {
        let clk = Expr::reference("clk", Type::Clock, RefKind::Port);
        let rst = Expr::reference("rst", Type::uint(1), RefKind::Port);
        let r = Expr::reference("r", Type::uint(8), RefKind::Register);
        Circuit {
            main: "Counter".into(),
            modules: vec![Module::Internal {
                name: "Counter".into(),
                ports: vec![
                    Port::new("clk", Direction::Input, Type::Clock),
                    Port::new("rst", Direction::Input, Type::uint(1)),
                    Port::new("out", Direction::Output, Type::uint(8)),
                ],
                body: Stmt::Block(vec![
                    Stmt::DefRegister {
                        name: "r".into(),
                        ty: Type::uint(8),
                        clock: clk,
                        reset: rst,
                        init: Expr::uint(0, 8),
                    },
                    Stmt::Connect {
                        loc: r.clone(),
                        rhs: Expr::DoPrim {
                            op: PrimOp::Addw,
                            args: vec![r.clone(), Expr::uint(1, 8)],
                            consts: smallvec![],
                            ty: Type::uint(8),
                        },
                    },
                    Stmt::Connect {
                        loc: Expr::reference(
                            "out",
                            Type::uint(8),
                            RefKind::Port,
                        ),
                        rhs: r,
                    },
                ]),
            }],
        }
    }

    #[test]
    fn serializes_a_counter() {
        let expected = "\
circuit Counter :
  module Counter :
    input clk : Clock
    input rst : UInt<1>
    output out : UInt<8>

    reg r : UInt<8>, clk with : (reset => (rst, UInt<8>(\"h0\")))
    r <= addw(r, UInt<8>(\"h1\"))
    out <= r

";
        assert_eq!(Printer::circuit_string(&counter()), expected);
    }

    #[test]
    fn serialization_is_deterministic() {
        let c = counter();
        assert_eq!(Printer::circuit_string(&c), Printer::circuit_string(&c));
    }

    #[test]
    fn serializes_external_stubs() {
        let c = Circuit {
            main: "Top".into(),
            modules: vec![Module::External {
                name: "Rom".into(),
                ports: vec![Port::new("addr", Direction::Input, Type::uint(4))],
                defname: "Rom".into(),
                params: vec![
                    Param {
                        name: "DEPTH".into(),
                        value: ParamValue::Int(16),
                    },
                    Param {
                        name: "INIT".into(),
                        value: ParamValue::String("rom.hex".into()),
                    },
                ],
            }],
        };
        let expected = "\
circuit Top :
  extmodule Rom :
    input addr : UInt<4>
    defname = Rom
    parameter DEPTH = 16
    parameter INIT = \"rom.hex\"

";
        assert_eq!(Printer::circuit_string(&c), expected);
    }

    #[test]
    fn serializes_memories_and_simulation_constructs() {
        let clk = Expr::reference("clk", Type::Clock, RefKind::Port);
        let en = Expr::reference("en", Type::uint(1), RefKind::Port);
        let body = Stmt::Block(vec![
            Stmt::DefMemory(Memory {
                name: "m".into(),
                data_type: Type::uint(8),
                depth: 6,
                read_latency: 0,
                write_latency: 1,
                readers: vec!["p".into()],
                writers: vec!["w".into()],
                readwriters: vec![],
            }),
            Stmt::Print {
                clock: clk.clone(),
                en: en.clone(),
                string: "tick %d\n".into(),
                args: vec![en.clone()],
            },
            Stmt::Stop {
                clock: clk,
                en,
                code: 1,
            },
        ]);
        let c = Circuit {
            main: "M".into(),
            modules: vec![Module::Internal {
                name: "M".into(),
                ports: vec![
                    Port::new("clk", Direction::Input, Type::Clock),
                    Port::new("en", Direction::Input, Type::uint(1)),
                ],
                body,
            }],
        };
        let text = Printer::circuit_string(&c);
        assert!(text.contains("    mem m :\n"));
        assert!(text.contains("      data-type => UInt<8>\n"));
        assert!(text.contains("      depth => 6\n"));
        assert!(text.contains("      reader => p\n"));
        assert!(text.contains("      writer => w\n"));
        assert!(text.contains("    printf(clk, en, \"tick %d\\n\", en)\n"));
        assert!(text.contains("    stop(clk, en, 1)\n"));
    }

    #[test]
    fn escapes_string_literals() {
        assert_eq!(escape_string("a\"b"), "a\\\"b");
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("line\n\tend"), "line\\n\\tend");
        assert_eq!(escape_string("pct %d kept"), "pct %d kept");
    }
}
