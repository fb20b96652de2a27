use symbol_table::GlobalSymbol;

/// An interned identifier: a module, port, wire, node, register, memory,
/// or instance name.
///
/// Identifiers are `Copy` and compare by symbol, so netlist keys, rename
/// tables, and name sets never hash strings twice. The backing strings
/// live for the whole process, which is also the lifetime of the circuits
/// that mention them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(GlobalSymbol);

impl Id {
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    /// A new identifier with `suffix` glued on. This is how every derived
    /// name in the compiler is built: rename candidates (`reg` becomes
    /// `reg_`) and counted temporaries (`_GEN` becomes `_GEN_0`).
    pub fn appended<S: std::fmt::Display>(&self, suffix: S) -> Id {
        Id(GlobalSymbol::from(format!("{}{}", self.0, suffix)))
    }
}

/* ============== Impls to keep identifier call sites terse ============= */

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Debug output reads as the bare name; the interning is an implementation
// detail no failure message should surface.
impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(GlobalSymbol::from(s))
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(GlobalSymbol::from(s))
    }
}

// Compared against literals all over the test suites; comparing the
// backing `str` avoids interning every probe.
impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return the object's name.
    fn name(&self) -> Id;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_text_is_the_same_symbol() {
        let a = Id::from("m_r_addr");
        let b = Id::from(String::from("m_r_addr"));
        assert_eq!(a, b);
        assert_eq!(a, "m_r_addr");
        assert_eq!(a.as_str(), "m_r_addr");
    }

    #[test]
    fn appended_builds_derived_names() {
        let base = Id::from("_RAND");
        assert_eq!(base.appended("_0"), Id::from("_RAND_0"));
        assert_eq!(Id::from("reg").appended("_"), Id::from("reg_"));
    }

    #[test]
    fn debug_output_is_the_bare_name() {
        assert_eq!(format!("{:?}", Id::from("clk")), "clk");
    }
}
