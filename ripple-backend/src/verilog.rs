//! Verilog backend for the ripple compiler.
//!
//! Transforms a [`Circuit`] in low form into synthesizable Verilog-2001
//! text that is behaviorally equivalent to the input. Each module is
//! lowered with private state (netlist, namespace, token buffers) that is
//! discarded once its text has been written, so module lowerings are
//! independent of one another.
use crate::traits::Backend;
use crate::{Artifact, ArtifactKind, EmitRequest};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use ripple_ir::{
    Circuit, Direction, Expr, GetName, Id, Memory, Module, Param, ParamValue,
    Port, PrimOp, RefKind, Stmt, Type, escape_string,
};
use ripple_utils::{
    Error, NameGenerator, OutputFile, RippleResult, bits_needed_for,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;

/// Register updates stop chasing a mux once it has been expanded this many
/// times, keeping flattened always-blocks linear in the mux graph even
/// when subtrees are shared.
const MUX_FLATTEN_LIMIT: u64 = 4;

/// Fixed macro-guarded header emitted before any module.
const PREAMBLE: &str = "\
`ifdef RANDOMIZE_GARBAGE_ASSIGN
`define RANDOMIZE
`endif
`ifdef RANDOMIZE_INVALID_ASSIGN
`define RANDOMIZE
`endif
`ifdef RANDOMIZE_REG_INIT
`define RANDOMIZE
`endif
`ifdef RANDOMIZE_MEM_INIT
`define RANDOMIZE
`endif
";

/// Implements the Verilog backend. Only accepts circuits in low form:
/// ground-typed ports, memories with split ports and 0/1 latencies, and
/// primitive operands already lifted to literals, references, or
/// subfields.
#[derive(Default)]
pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn validate(circuit: &Circuit) -> RippleResult<()> {
        for module in &circuit.modules {
            for port in module.ports() {
                if !port.ty.is_ground() {
                    return Err(Error::malformed_ir(format!(
                        "port `{}` of module `{}` is not a ground type",
                        port.name,
                        module.name()
                    )));
                }
            }
            if let Module::Internal { body, .. } = module {
                validate_stmt(body)?;
            }
        }
        Ok(())
    }

    fn emit(circuit: &Circuit, file: &OutputFile) -> RippleResult<()> {
        let text = render_circuit(circuit)?;
        file.writer()?.write_all(text.as_bytes())?;
        Ok(())
    }

    fn artifacts(
        circuit: &Circuit,
        requests: &[EmitRequest],
    ) -> RippleResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for request in requests {
            match request {
                EmitRequest::Circuit => artifacts.push(Artifact {
                    name: circuit.main,
                    kind: ArtifactKind::VerilogCircuit,
                    text: render_circuit(circuit)?,
                }),
                EmitRequest::AllModules => {
                    artifacts.extend(render_module_artifacts(circuit)?);
                }
            }
        }
        Ok(artifacts)
    }
}

fn validate_stmt(stmt: &Stmt) -> RippleResult<()> {
    let mut result = Ok(());
    stmt.for_each(&mut |s| {
        if result.is_err() {
            return;
        }
        if let Stmt::DefMemory(mem) = s {
            result = validate_memory(mem);
        }
    });
    result
}

fn validate_memory(mem: &Memory) -> RippleResult<()> {
    if mem.read_latency != 0 || mem.write_latency != 1 {
        return Err(Error::unsupported_ir(format!(
            "memory `{}` has latencies ({}, {}); only (0, 1) lowers to Verilog",
            mem.name, mem.read_latency, mem.write_latency
        )));
    }
    if !mem.readwriters.is_empty() {
        return Err(Error::unsupported_ir(format!(
            "memory `{}` has readwrite ports; split them before emission",
            mem.name
        )));
    }
    if mem.depth == 0 {
        return Err(Error::malformed_ir(format!(
            "memory `{}` has zero depth",
            mem.name
        )));
    }
    Ok(())
}

/// Lower the whole circuit to one Verilog file.
fn render_circuit(circuit: &Circuit) -> RippleResult<String> {
    VerilogBackend::validate(circuit)?;
    let prepared = ripple_opt::prepare(circuit.clone())?;
    let mut buf = Vec::new();
    buf.write_all(PREAMBLE.as_bytes())?;
    for module in &prepared.modules {
        if module.is_internal() {
            let start = Instant::now();
            ModuleLowering::new(&prepared, module)?.write(&mut buf)?;
            log::info!(
                "Generated `{}` in {:?}",
                module.name(),
                start.elapsed()
            );
        }
    }
    Ok(String::from_utf8(buf)?)
}

/// Lower each internal module to its own preamble-prefixed file.
fn render_module_artifacts(
    circuit: &Circuit,
) -> RippleResult<Vec<Artifact>> {
    VerilogBackend::validate(circuit)?;
    let prepared = ripple_opt::prepare(circuit.clone())?;
    let mut artifacts = Vec::new();
    for module in &prepared.modules {
        if module.is_internal() {
            let mut buf = Vec::new();
            buf.write_all(PREAMBLE.as_bytes())?;
            ModuleLowering::new(&prepared, module)?.write(&mut buf)?;
            artifacts.push(Artifact {
                name: module.name(),
                kind: ArtifactKind::VerilogModule,
                text: String::from_utf8(buf)?,
            });
        }
    }
    Ok(artifacts)
}

//==========================================
//        Expression rendering
//==========================================

/// Hex digits of `value`, zero-padded to the width of the literal.
fn hex_digits(value: u128, width: u64) -> String {
    let digits = (width.div_ceil(4)).max(1) as usize;
    format!("{:0>digits$x}", value)
}

/// Flattened Verilog name of a reference path (`m.r.addr` to `m_r_addr`).
fn lowered_name(e: &Expr) -> RippleResult<String> {
    match e {
        Expr::Ref { name, .. } => Ok(name.to_string()),
        Expr::SubField { expr, name, .. } => {
            Ok(format!("{}_{}", lowered_name(expr)?, name))
        }
        Expr::SubIndex { expr, index, .. } => {
            Ok(format!("{}_{}", lowered_name(expr)?, index))
        }
        _ => Err(Error::malformed_ir(format!(
            "expected a lowerable reference, got `{e}`"
        ))),
    }
}

/// Render an expression as a Verilog fragment.
fn v_expr(e: &Expr) -> RippleResult<String> {
    match e {
        Expr::UIntLit { value, width } => {
            Ok(format!("{}'h{}", width, hex_digits(*value, *width)))
        }
        Expr::SIntLit { value, width } => {
            let digits = hex_digits(value.unsigned_abs(), *width);
            if *value < 0 {
                Ok(format!("-{}'sh{}", width, digits))
            } else {
                Ok(format!("{}'sh{}", width, digits))
            }
        }
        Expr::Ref { name, .. } => Ok(name.to_string()),
        Expr::SubField { .. } | Expr::SubIndex { .. } => lowered_name(e),
        Expr::SubAccess { expr, index, .. } => {
            Ok(format!("{}[{}]", lowered_name(expr)?, lowered_name(index)?))
        }
        Expr::Mux {
            cond, tval, fval, ..
        } => Ok(format!(
            "{} ? {} : {}",
            v_expr(cond)?,
            v_cast(tval)?,
            v_cast(fval)?
        )),
        // The condition is redundant at the Verilog level; invalid values
        // randomize elsewhere.
        Expr::ValidIf { value, .. } => v_cast(value),
        Expr::DoPrim {
            op,
            args,
            consts,
            ty,
        } => v_primop(*op, args, consts, ty),
        Expr::Rand { width } => {
            Ok(format!("{{{}{{$random}}}}", random_words(*width)))
        }
    }
}

/// Number of 32-bit `$random` draws needed to cover `width` bits.
fn random_words(width: u64) -> u64 {
    width.div_ceil(32).max(1)
}

/// Sign the rendering of `e` according to its own type.
fn v_cast(e: &Expr) -> RippleResult<String> {
    let s = v_expr(e)?;
    Ok(if e.is_signed() {
        format!("$signed({})", s)
    } else {
        s
    })
}

/// Sign the rendering of `e` according to a result type.
fn cast_as(e: &Expr, ty: &Type) -> RippleResult<String> {
    let s = v_expr(e)?;
    Ok(if ty.is_signed() {
        format!("$signed({})", s)
    } else {
        s
    })
}

/// Coerce an operand to signed when any sibling operand is signed.
/// Unsigned operands gain an explicit zero sign bit first.
fn cast_if(e: &Expr, any_signed: bool) -> RippleResult<String> {
    if !any_signed {
        return v_expr(e);
    }
    if e.is_signed() {
        Ok(format!("$signed({})", v_expr(e)?))
    } else {
        Ok(format!("$signed({{1'b0,{}}})", v_expr(e)?))
    }
}

fn arg<'e>(args: &'e [Expr], i: usize, op: PrimOp) -> RippleResult<&'e Expr> {
    args.get(i).ok_or_else(|| {
        Error::malformed_ir(format!("`{op}` is missing operand {i}"))
    })
}

fn konst(consts: &[u64], i: usize, op: PrimOp) -> RippleResult<u64> {
    consts.get(i).copied().ok_or_else(|| {
        Error::malformed_ir(format!("`{op}` is missing constant operand {i}"))
    })
}

fn v_primop(
    op: PrimOp,
    args: &[Expr],
    consts: &[u64],
    ty: &Type,
) -> RippleResult<String> {
    use PrimOp::*;
    for a in args {
        let simple = matches!(
            a,
            Expr::UIntLit { .. }
                | Expr::SIntLit { .. }
                | Expr::Ref { .. }
                | Expr::SubField { .. }
        );
        if !simple {
            return Err(Error::malformed_ir(format!(
                "operand of `{op}` must be a literal, reference, or \
                 subfield, got `{a}`"
            )));
        }
    }
    match op {
        Add | Addw | Sub | Subw | Mul | Div | Rem | Lt | Leq | Gt | Geq
        | Eq | Neq => {
            let symbol = match op {
                Add | Addw => "+",
                Sub | Subw => "-",
                Mul => "*",
                Div => "/",
                Rem => "%",
                Lt => "<",
                Leq => "<=",
                Gt => ">",
                Geq => ">=",
                Eq => "==",
                _ => "!=",
            };
            let (a, b) = (arg(args, 0, op)?, arg(args, 1, op)?);
            let any_signed = a.is_signed() || b.is_signed();
            Ok(format!(
                "{} {} {}",
                cast_if(a, any_signed)?,
                symbol,
                cast_if(b, any_signed)?
            ))
        }
        And | Or | Xor => {
            let symbol = match op {
                And => "&",
                Or => "|",
                _ => "^",
            };
            Ok(format!(
                "{} {} {}",
                cast_as(arg(args, 0, op)?, ty)?,
                symbol,
                cast_as(arg(args, 1, op)?, ty)?
            ))
        }
        Not => Ok(format!("~ {}", v_expr(arg(args, 0, op)?)?)),
        Andr => Ok(format!("&{}", v_expr(arg(args, 0, op)?)?)),
        Orr => Ok(format!("|{}", v_expr(arg(args, 0, op)?)?)),
        Xorr => Ok(format!("^{}", v_expr(arg(args, 0, op)?)?)),
        Shl | Shlw => Ok(format!(
            "{} << {}",
            cast_as(arg(args, 0, op)?, ty)?,
            konst(consts, 0, op)?
        )),
        Shr => {
            let a = arg(args, 0, op)?;
            let amount = konst(consts, 0, op)?;
            let width = a.width();
            if amount >= width {
                return Err(Error::unsupported_ir(format!(
                    "constant right shift by {amount} consumes all {width} \
                     bits of `{a}`"
                )));
            }
            Ok(format!("{}[{}:{}]", v_expr(a)?, width - 1, amount))
        }
        Dshl | Dshlw => Ok(format!(
            "{} << {}",
            cast_as(arg(args, 0, op)?, ty)?,
            v_expr(arg(args, 1, op)?)?
        )),
        Dshr => {
            let shift = if ty.is_signed() { ">>>" } else { ">>" };
            Ok(format!(
                "{} {} {}",
                cast_as(arg(args, 0, op)?, ty)?,
                shift,
                v_expr(arg(args, 1, op)?)?
            ))
        }
        Pad => {
            let a = arg(args, 0, op)?;
            let n = konst(consts, 0, op)?;
            let w = a.width();
            if w == 0 || n <= w {
                v_expr(a)
            } else if !ty.is_signed() {
                Ok(format!("{{{{{}'d0}}, {}}}", n - w, v_expr(a)?))
            } else if w == 1 {
                Ok(format!("{{{}{{{}}}}}", n, v_expr(a)?))
            } else {
                let a = v_expr(a)?;
                Ok(format!("{{{{{}{{{}[{}]}}}}, {}}}", n - w, a, w - 1, a))
            }
        }
        Neg => Ok(format!("-{{{}}}", cast_as(arg(args, 0, op)?, ty)?)),
        Cvt => {
            let a = arg(args, 0, op)?;
            if a.is_signed() {
                cast_as(a, ty)
            } else {
                Ok(format!("{{1'b0, {}}}", cast_as(a, ty)?))
            }
        }
        AsUInt | AsClock => {
            Ok(format!("$unsigned({})", v_expr(arg(args, 0, op)?)?))
        }
        AsSInt => Ok(format!("$signed({})", v_expr(arg(args, 0, op)?)?)),
        Cat => Ok(format!(
            "{{{}, {}}}",
            cast_as(arg(args, 0, op)?, ty)?,
            cast_as(arg(args, 1, op)?, ty)?
        )),
        Bits => {
            let a = arg(args, 0, op)?;
            let hi = konst(consts, 0, op)?;
            let lo = konst(consts, 1, op)?;
            if hi == lo && hi == 0 && a.width() == 1 {
                v_expr(a)
            } else if hi == lo {
                Ok(format!("{}[{}]", v_expr(a)?, hi))
            } else {
                Ok(format!("{}[{}:{}]", v_expr(a)?, hi, lo))
            }
        }
        Head => {
            let a = arg(args, 0, op)?;
            let n = konst(consts, 0, op)?;
            let w = a.width();
            Ok(format!("{}[{}:{}]", v_expr(a)?, w - 1, w - n))
        }
        Tail => {
            let a = arg(args, 0, op)?;
            let n = konst(consts, 0, op)?;
            let w = a.width();
            Ok(format!("{}[{}:0]", v_expr(a)?, w - n - 1))
        }
    }
}

/// `[w-1:0]` for multi-bit ground types, empty otherwise.
fn emit_type(ty: &Type) -> String {
    match ty {
        Type::Clock => String::new(),
        Type::UInt { width } | Type::SInt { width } | Type::Analog { width } => {
            if *width > 1 {
                format!("[{}:0]", width - 1)
            } else {
                String::new()
            }
        }
        Type::Vector { elem, .. } => emit_type(elem),
    }
}

fn sign_prefix(ty: &Type) -> &'static str {
    match ty {
        Type::SInt { .. } => "signed ",
        Type::Vector { elem, .. } if elem.is_signed() => "signed ",
        _ => "",
    }
}

fn format_param(param: &Param) -> String {
    let value = match &param.value {
        ParamValue::Int(v) => v.to_string(),
        ParamValue::String(s) => format!("\"{}\"", escape_string(s)),
        ParamValue::Raw(s) => s.clone(),
    };
    format!(".{}({})", param.name, value)
}

//==========================================
//        Per-module lowering
//==========================================

/// Mutable state for lowering one module. Built, driven, and discarded
/// per module; nothing survives across modules.
struct ModuleLowering<'a> {
    circuit: &'a Circuit,
    name: Id,
    ports: &'a [Port],
    body: &'a Stmt,
    namespace: NameGenerator,
    /// Driver of every connect target, node, and invalidated reference,
    /// keyed by the canonical serialization of the target expression.
    /// Insertion order is the statement-tree traversal order.
    netlist: LinkedHashMap<String, Expr>,
    portdefs: Vec<String>,
    declares: Vec<String>,
    instdeclares: Vec<String>,
    assigns: Vec<String>,
    attach_synth: Vec<String>,
    attach_aliases: Vec<String>,
    initials: Vec<String>,
    /// Always-block bodies in first-observed clock order.
    at_clock: LinkedHashMap<String, Vec<String>>,
}

impl<'a> ModuleLowering<'a> {
    fn new(circuit: &'a Circuit, module: &'a Module) -> RippleResult<Self> {
        let names = module.bound_names();
        let Module::Internal { name, ports, body } = module else {
            return Err(Error::internal(
                "attempted to lower an external module",
            ));
        };
        let mut lowering = ModuleLowering {
            circuit,
            name: *name,
            ports,
            body,
            namespace: NameGenerator::with_prev_defined_names(names),
            netlist: LinkedHashMap::new(),
            portdefs: Vec::new(),
            declares: Vec::new(),
            instdeclares: Vec::new(),
            assigns: Vec::new(),
            attach_synth: Vec::new(),
            attach_aliases: Vec::new(),
            initials: Vec::new(),
            at_clock: LinkedHashMap::new(),
        };
        lowering.build_netlist(body);
        Ok(lowering)
    }

    /// Single pre-scan indexing the right-hand side of every connect,
    /// node, and invalidate.
    fn build_netlist(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.build_netlist(s);
                }
            }
            Stmt::Connect { loc, rhs } => {
                self.netlist.insert(loc.to_string(), rhs.clone());
            }
            Stmt::DefNode { name, value } => {
                self.netlist.insert(name.to_string(), value.clone());
            }
            Stmt::IsInvalid { expr } => {
                let temp = self.namespace.gen_name("_T");
                self.netlist.insert(
                    expr.to_string(),
                    Expr::reference(temp, expr.ty(), RefKind::Node),
                );
            }
            _ => {}
        }
    }

    fn build_ports(&mut self) {
        let types: Vec<String> =
            self.ports.iter().map(|p| emit_type(&p.ty)).collect();
        let type_width = types.iter().map(String::len).max().unwrap_or(0);
        for (port, ty) in self.ports.iter().zip(&types) {
            let dir = match (&port.ty, port.direction) {
                (Type::Analog { .. }, _) => "inout ",
                (_, Direction::Input) => "input ",
                (_, Direction::Output) => "output",
            };
            let def = if type_width == 0 {
                format!("  {} {}", dir, port.name)
            } else {
                format!("  {} {:<type_width$} {}", dir, ty, port.name)
            };
            self.portdefs.push(def);
        }
    }

    fn declare(&mut self, kind: &str, name: &str, ty: &Type) {
        let line = match ty {
            Type::Vector { elem, size } => {
                let kind = if elem.width() * size > (1 << 29) {
                    format!("{} /* sparse */", kind)
                } else {
                    kind.to_string()
                };
                let range = emit_type(elem);
                if range.is_empty() {
                    format!(
                        "  {} {}{} [{}:0];",
                        kind,
                        sign_prefix(ty),
                        name,
                        size - 1
                    )
                } else {
                    format!(
                        "  {} {}{} {} [{}:0];",
                        kind,
                        sign_prefix(ty),
                        range,
                        name,
                        size - 1
                    )
                }
            }
            ty => {
                let range = emit_type(ty);
                if range.is_empty() {
                    format!("  {} {}{};", kind, sign_prefix(ty), name)
                } else {
                    format!(
                        "  {} {}{} {};",
                        kind,
                        sign_prefix(ty),
                        range,
                        name
                    )
                }
            }
        };
        self.declares.push(line);
    }

    /// Declare a fresh `_RAND` register and append a guarded
    /// initialization pair for `target`.
    fn initialize(
        &mut self,
        target: &str,
        width: u64,
        guard: &str,
    ) -> RippleResult<()> {
        let words = random_words(width);
        let rand = self.namespace.gen_name("_RAND");
        self.declares
            .push(format!("  reg [{}:0] {};", 32 * words - 1, rand));
        let draw = v_expr(&Expr::Rand { width })?;
        self.initials.push(format!("`ifdef {}", guard));
        self.initials.push(format!("{} = {};", rand, draw));
        self.initials.push(format!(
            "{} = {}[{}:0];",
            target,
            rand,
            width.saturating_sub(1)
        ));
        self.initials.push("`endif".to_string());
        Ok(())
    }

    fn driver(&self, key: &str, what: &str) -> RippleResult<&Expr> {
        self.netlist.get(key).ok_or_else(|| {
            Error::malformed_ir(format!("{what} `{key}` has no driver"))
        })
    }

    /// Second walk over the body, filling every output buffer.
    fn build_streams(&mut self, stmt: &Stmt) -> RippleResult<()> {
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.build_streams(s)?;
                }
                Ok(())
            }
            Stmt::Skip => Ok(()),
            Stmt::Connect { loc, rhs } => {
                match loc.kind() {
                    Some(
                        RefKind::Port | RefKind::Wire | RefKind::Instance,
                    ) => {
                        self.assigns.push(format!(
                            "  assign {} = {};",
                            lowered_name(loc)?,
                            v_expr(rhs)?
                        ));
                    }
                    // Registers and memory ports are driven through the
                    // netlist.
                    Some(_) => {}
                    None => {
                        return Err(Error::malformed_ir(format!(
                            "connect target `{loc}` is not a reference"
                        )));
                    }
                }
                Ok(())
            }
            Stmt::DefWire { name, ty } => {
                self.declare("wire", name.as_ref(), ty);
                Ok(())
            }
            Stmt::DefNode { name, value } => {
                self.declare("wire", name.as_ref(), &value.ty());
                self.assigns.push(format!(
                    "  assign {} = {};",
                    name,
                    v_expr(value)?
                ));
                Ok(())
            }
            Stmt::DefRegister {
                name,
                ty,
                clock,
                reset,
                init,
            } => {
                self.declare("reg", name.as_ref(), ty);
                let reg = Expr::reference(*name, ty.clone(), RefKind::Register);
                self.reg_update(&reg, clock, reset, init)?;
                self.initialize(
                    name.as_ref(),
                    ty.width(),
                    "RANDOMIZE_REG_INIT",
                )?;
                Ok(())
            }
            Stmt::IsInvalid { expr } => {
                let temp =
                    self.driver(&expr.to_string(), "invalidated reference")?;
                let temp_name = v_expr(temp)?;
                self.declare("reg", &temp_name, &expr.ty());
                self.initialize(
                    &temp_name,
                    expr.width(),
                    "RANDOMIZE_INVALID_ASSIGN",
                )?;
                if matches!(
                    expr.kind(),
                    Some(RefKind::Port | RefKind::Wire | RefKind::Instance)
                ) {
                    self.assigns
                        .push("`ifdef RANDOMIZE_INVALID_ASSIGN".to_string());
                    self.assigns.push(format!(
                        "  assign {} = {};",
                        lowered_name(expr)?,
                        temp_name
                    ));
                    self.assigns.push("`endif".to_string());
                }
                Ok(())
            }
            Stmt::DefMemory(mem) => self.lower_memory(mem),
            Stmt::DefInstanceConnected {
                name,
                module,
                port_cons,
            } => self.lower_instance(*name, *module, port_cons),
            Stmt::DefInstance { name, .. }
            | Stmt::DefInstanceConnector { name, .. } => {
                Err(Error::internal(format!(
                    "instance `{name}` was not connected before emission"
                )))
            }
            Stmt::Attach(exprs) => {
                for (i, a) in exprs.iter().enumerate() {
                    for b in exprs.iter().skip(i + 1) {
                        let (a, b) = (lowered_name(a)?, lowered_name(b)?);
                        self.attach_synth
                            .push(format!("  assign {} = {};", a, b));
                        self.attach_synth
                            .push(format!("  assign {} = {};", b, a));
                    }
                }
                let alias: Vec<String> = exprs
                    .iter()
                    .map(lowered_name)
                    .collect::<RippleResult<_>>()?;
                self.attach_aliases
                    .push(format!("  alias {};", alias.join(" = ")));
                Ok(())
            }
            Stmt::Stop { clock, en, code } => {
                let terminate = if *code == 0 { "$finish;" } else { "$fatal;" };
                self.simulate(clock, en, terminate.to_string(), "STOP_COND")
            }
            Stmt::Print {
                clock,
                en,
                string,
                args,
            } => {
                let mut rendered_args = String::new();
                for a in args {
                    rendered_args.push(',');
                    rendered_args.push_str(&v_expr(a)?);
                }
                let call = format!(
                    "$fwrite(32'h80000002,\"{}\"{});",
                    escape_string(string),
                    rendered_args
                );
                self.simulate(clock, en, call, "PRINTF_COND")
            }
        }
    }

    /// Flatten the mux tree guarding a register's next value into nested
    /// `if` statements in the register's clock block.
    fn reg_update(
        &mut self,
        reg: &Expr,
        clock: &Expr,
        reset: &Expr,
        init: &Expr,
    ) -> RippleResult<()> {
        let reg_key = reg.to_string();
        let driver = self.driver(&reg_key, "register")?.clone();
        // A register initialized to itself resets asynchronously
        // elsewhere; the reset mux is skipped entirely.
        let next = if init.to_string() == reg_key {
            driver
        } else {
            Expr::Mux {
                cond: Box::new(reset.clone()),
                tval: Box::new(init.clone()),
                fval: Box::new(driver),
                ty: reg.ty(),
            }
        };
        let mut flatten_counts: HashMap<usize, u64> = HashMap::new();
        let lines = self.add_update(reg, &next, 0, &mut flatten_counts)?;
        let clock_key = v_expr(clock)?;
        self.at_clock.entry(clock_key).or_insert_with(Vec::new).extend(lines);
        Ok(())
    }

    fn add_update(
        &self,
        reg: &Expr,
        e: &Expr,
        tabs: usize,
        counts: &mut HashMap<usize, u64>,
    ) -> RippleResult<Vec<String>> {
        // A self-connection is a no-op.
        if e.to_string() == reg.to_string() {
            return Ok(Vec::new());
        }
        // Only combinational kinds resolve through the netlist; registers
        // and other stateful kinds are never chased.
        let resolved = match e.kind() {
            Some(RefKind::Wire | RefKind::Node) => {
                self.netlist.get(&e.to_string()).unwrap_or(e)
            }
            _ => e,
        };
        if let Expr::Mux {
            cond, tval, fval, ..
        } = resolved
        {
            // Counting is by node identity: the same shared mux reached
            // along different netlist paths shares one counter.
            let seen = counts
                .entry(resolved as *const Expr as usize)
                .or_insert(0);
            if *seen < MUX_FLATTEN_LIMIT {
                *seen += 1;
                let true_lines =
                    self.add_update(reg, tval, tabs + 1, counts)?;
                let false_lines =
                    self.add_update(reg, fval, tabs + 1, counts)?;
                let indent = "  ".repeat(tabs);
                let mut lines = Vec::new();
                match (true_lines.is_empty(), false_lines.is_empty()) {
                    (false, false) => {
                        lines.push(format!(
                            "{}if ({}) begin",
                            indent,
                            v_expr(cond)?
                        ));
                        lines.extend(true_lines);
                        lines.push(format!("{}end else begin", indent));
                        lines.extend(false_lines);
                        lines.push(format!("{}end", indent));
                    }
                    (false, true) => {
                        lines.push(format!(
                            "{}if ({}) begin",
                            indent,
                            v_expr(cond)?
                        ));
                        lines.extend(true_lines);
                        lines.push(format!("{}end", indent));
                    }
                    (true, false) => {
                        lines.push(format!(
                            "{}if (!({})) begin",
                            indent,
                            v_expr(cond)?
                        ));
                        lines.extend(false_lines);
                        lines.push(format!("{}end", indent));
                    }
                    (true, true) => {}
                }
                return Ok(lines);
            }
        }
        Ok(vec![format!(
            "{}{} <= {};",
            "  ".repeat(tabs),
            lowered_name(reg)?,
            v_expr(resolved)?
        )])
    }

    fn lower_memory(&mut self, mem: &Memory) -> RippleResult<()> {
        validate_memory(mem)?;
        let data_width = mem.data_type.width();
        let addr_width = bits_needed_for(mem.depth);
        self.declare(
            "reg",
            mem.name.as_ref(),
            &Type::Vector {
                elem: Box::new(mem.data_type.clone()),
                size: mem.depth,
            },
        );
        self.init_memory(mem)?;
        for reader in &mem.readers {
            let data = format!("{}_{}_data", mem.name, reader);
            let addr = format!("{}_{}_addr", mem.name, reader);
            self.declare("wire", &data, &mem.data_type);
            self.declare("wire", &addr, &Type::uint(addr_width));
            let addr_driver = self
                .driver(&format!("{}.{}.addr", mem.name, reader), "read port")?
                .clone();
            self.assigns.push(format!(
                "  assign {} = {};",
                addr,
                v_expr(&addr_driver)?
            ));
            let mem_port = format!("{}[{}]", mem.name, addr);
            if mem.depth.is_power_of_two() {
                self.assigns
                    .push(format!("  assign {} = {};", data, mem_port));
            } else {
                // Out-of-range reads return garbage when randomization is
                // on; the depth guard keeps the common case a plain read.
                let garbage = v_expr(&Expr::Rand { width: data_width })?;
                self.assigns
                    .push("`ifndef RANDOMIZE_GARBAGE_ASSIGN".to_string());
                self.assigns
                    .push(format!("  assign {} = {};", data, mem_port));
                self.assigns.push("`else".to_string());
                self.assigns.push(format!(
                    "  assign {} = ({} >= {}'h{}) ? {} : {};",
                    data,
                    addr,
                    addr_width,
                    hex_digits(mem.depth as u128, addr_width),
                    garbage,
                    mem_port
                ));
                self.assigns.push("`endif".to_string());
            }
        }
        for writer in &mem.writers {
            let data = format!("{}_{}_data", mem.name, writer);
            let addr = format!("{}_{}_addr", mem.name, writer);
            let mask = format!("{}_{}_mask", mem.name, writer);
            let en = format!("{}_{}_en", mem.name, writer);
            self.declare("wire", &data, &mem.data_type);
            self.declare("wire", &addr, &Type::uint(addr_width));
            self.declare("wire", &mask, &Type::uint(1));
            self.declare("wire", &en, &Type::uint(1));
            for (wire, field) in [
                (&data, "data"),
                (&addr, "addr"),
                (&mask, "mask"),
                (&en, "en"),
            ] {
                let driver = self
                    .driver(
                        &format!("{}.{}.{}", mem.name, writer, field),
                        "write port",
                    )?
                    .clone();
                self.assigns.push(format!(
                    "  assign {} = {};",
                    wire,
                    v_expr(&driver)?
                ));
            }
            let clock = self
                .driver(
                    &format!("{}.{}.clk", mem.name, writer),
                    "write port",
                )?
                .clone();
            let clock_key = v_expr(&clock)?;
            let body = vec![
                format!("if ({} & {}) begin", en, mask),
                format!("  {}[{}] <= {};", mem.name, addr, data),
                "end".to_string(),
            ];
            self.at_clock
                .entry(clock_key)
                .or_insert_with(Vec::new)
                .extend(body);
        }
        Ok(())
    }

    fn init_memory(&mut self, mem: &Memory) -> RippleResult<()> {
        let data_width = mem.data_type.width();
        let words = random_words(data_width);
        let rand = self.namespace.gen_name("_RAND");
        self.declares
            .push(format!("  reg [{}:0] {};", 32 * words - 1, rand));
        let draw = v_expr(&Expr::Rand { width: data_width })?;
        self.initials
            .push("`ifdef RANDOMIZE_MEM_INIT".to_string());
        self.initials.push(format!("{} = {};", rand, draw));
        self.initials.push(format!(
            "for (initvar = 0; initvar < {}; initvar = initvar+1)",
            mem.depth
        ));
        self.initials.push(format!(
            "  {}[initvar] = {}[{}:0];",
            mem.name,
            rand,
            data_width.saturating_sub(1)
        ));
        self.initials.push("`endif".to_string());
        Ok(())
    }

    fn lower_instance(
        &mut self,
        name: Id,
        module: Id,
        port_cons: &[(Expr, Expr)],
    ) -> RippleResult<()> {
        let target = self.circuit.find_module(module).ok_or_else(|| {
            Error::malformed_ir(format!(
                "instance `{name}` refers to undeclared module `{module}`"
            ))
        })?;
        let (defname, params): (Id, &[Param]) = match target {
            Module::Internal { name, .. } => (*name, &[]),
            Module::External {
                defname, params, ..
            } => (*defname, params),
        };
        // One wire per port, named by the lowered port subfield; input
        // drivers arrive as ordinary assigns from connects.
        for (port_expr, _) in port_cons {
            self.declare("wire", &lowered_name(port_expr)?, &port_expr.ty());
        }
        let header = if params.is_empty() {
            format!("  {} {} (", defname, name)
        } else {
            format!(
                "  {} #({}) {} (",
                defname,
                params.iter().map(format_param).join(", "),
                name
            )
        };
        self.instdeclares.push(header);
        for (i, (port_expr, bound)) in port_cons.iter().enumerate() {
            let comma = if i + 1 == port_cons.len() { "" } else { "," };
            self.instdeclares.push(format!(
                "    .{}({}){}",
                remove_root(port_expr)?,
                v_expr(bound)?,
                comma
            ));
        }
        self.instdeclares.push("  );".to_string());
        Ok(())
    }

    /// Append a simulation-only construct to its clock block, guarded by
    /// `SYNTHESIS` and the given condition macro.
    fn simulate(
        &mut self,
        clock: &Expr,
        en: &Expr,
        body: String,
        guard: &str,
    ) -> RippleResult<()> {
        let lines = vec![
            "`ifndef SYNTHESIS".to_string(),
            format!("`ifdef {}", guard),
            format!("if (`{}) begin", guard),
            "`endif".to_string(),
            format!("if ({}) begin", v_expr(en)?),
            format!("  {}", body),
            "end".to_string(),
            format!("`ifdef {}", guard),
            "end".to_string(),
            "`endif".to_string(),
            "`endif".to_string(),
        ];
        let clock_key = v_expr(clock)?;
        self.at_clock
            .entry(clock_key)
            .or_insert_with(Vec::new)
            .extend(lines);
        Ok(())
    }

    /// Render the module into `f`: header, declarations, instances,
    /// assigns, attach section, randomization initial block, and one
    /// always-block per clock in first-seen order.
    fn write<F: io::Write>(mut self, f: &mut F) -> RippleResult<()> {
        self.build_ports();
        let body = self.body;
        self.build_streams(body)?;

        writeln!(f, "module {}(", self.name)?;
        for (i, def) in self.portdefs.iter().enumerate() {
            if i + 1 == self.portdefs.len() {
                writeln!(f, "{}", def)?;
            } else {
                writeln!(f, "{},", def)?;
            }
        }
        writeln!(f, ");")?;
        for line in &self.declares {
            writeln!(f, "{}", line)?;
        }
        for line in &self.instdeclares {
            writeln!(f, "{}", line)?;
        }
        for line in &self.assigns {
            writeln!(f, "{}", line)?;
        }
        if self.declares.is_empty() && self.assigns.is_empty() {
            // Keep degenerate modules legal.
            writeln!(f, "  initial begin end")?;
        }
        if !self.attach_synth.is_empty() {
            writeln!(f, "`ifdef SYNTHESIS")?;
            for line in &self.attach_synth {
                writeln!(f, "{}", line)?;
            }
            writeln!(f, "`elsif verilator")?;
            writeln!(
                f,
                "  `error \"Verilator does not support alias and cannot \
                 arbitrate the attached nets\""
            )?;
            writeln!(f, "`else")?;
            for line in &self.attach_aliases {
                writeln!(f, "{}", line)?;
            }
            writeln!(f, "`endif")?;
        }
        if !self.initials.is_empty() {
            writeln!(f, "`ifdef RANDOMIZE")?;
            writeln!(f, "  integer initvar;")?;
            writeln!(f, "  initial begin")?;
            writeln!(f, "    `ifndef verilator")?;
            writeln!(f, "      #0.002 begin end")?;
            writeln!(f, "    `endif")?;
            for line in &self.initials {
                writeln!(f, "    {}", line)?;
            }
            writeln!(f, "  end")?;
            writeln!(f, "`endif")?;
        }
        for (clock, lines) in &self.at_clock {
            if lines.is_empty() {
                continue;
            }
            writeln!(f, "  always @(posedge {}) begin", clock)?;
            for line in lines {
                writeln!(f, "    {}", line)?;
            }
            writeln!(f, "  end")?;
        }
        writeln!(f, "endmodule")?;
        writeln!(f)?;
        Ok(())
    }
}

/// Innermost field path of an instance port access, root stripped.
fn remove_root(e: &Expr) -> RippleResult<String> {
    match e {
        Expr::SubField { expr, name, .. } => match &**expr {
            Expr::Ref { .. } => Ok(name.to_string()),
            Expr::SubField { .. } => {
                Ok(format!("{}_{}", remove_root(expr)?, name))
            }
            other => Err(Error::internal(format!(
                "cannot strip the root of `{other}`"
            ))),
        },
        _ => Err(Error::internal(format!(
            "expected a field access, got `{e}`"
        ))),
    }
}
