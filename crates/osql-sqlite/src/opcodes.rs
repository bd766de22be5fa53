// crates/osql-sqlite/src/opcodes.rs
// ============================================================================
// Module: Opcode Semantics
// Description: Static table of SQLite VDBE opcodes that pin a result type.
// Purpose: Tell the query planner which register an opcode writes and how.
// Dependencies: osql-core
// ============================================================================

//! ## Overview
//! The table is a closed, curated subset of SQLite's bytecode instruction set:
//! only opcodes whose output type follows from the opcode and the types of
//! its inputs (literal loads, column fetches, arithmetic, logic and bit
//! operations, counters, casts, and function calls). Every other opcode is a
//! no-op for typing.

use osql_core::ColumnType;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Operand slot of a program row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// First operand.
    P1,
    /// Second operand.
    P2,
    /// Third operand.
    P3,
}

impl Register {
    /// Returns the `EXPLAIN` column name of the operand.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::P3 => "p3",
        }
    }
}

/// How an opcode determines the type it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeEffect {
    /// The written value always has this type.
    Fixed(ColumnType),
    /// Numeric result of the values in the P1 and P2 registers.
    Arithmetic,
    /// Declared type of column P2 of the table open on cursor P1.
    ColumnFetch,
    /// Return type of the function named in P4.
    ///
    /// Functions whose result follows their input take the type of the
    /// `argument` register.
    FunctionResult {
        /// Operand holding the first argument (or accumulator) register.
        argument: Register,
    },
    /// The type follows the affinity code in P2.
    CastAffinity,
}

/// Result type of a built-in SQL function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    /// The function always returns this type.
    Fixed(ColumnType),
    /// The function returns a value of its first argument's type.
    FirstArgument,
}

/// One entry of the opcode semantics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSemantics {
    /// VDBE opcode name.
    pub opcode: &'static str,
    /// Operand holding the destination register.
    pub register: Register,
    /// Type effect on the destination register.
    pub effect: OpcodeEffect,
}

/// Shorthand for a fixed-type table entry.
const fn fixed(opcode: &'static str, register: Register, column_type: ColumnType) -> OpcodeSemantics {
    OpcodeSemantics {
        opcode,
        register,
        effect: OpcodeEffect::Fixed(column_type),
    }
}

/// Shorthand for an entry whose effect depends on other registers.
const fn derived(opcode: &'static str, register: Register, effect: OpcodeEffect) -> OpcodeSemantics {
    OpcodeSemantics {
        opcode,
        register,
        effect,
    }
}

/// Shorthand for a function-call table entry.
const fn call(opcode: &'static str, register: Register, argument: Register) -> OpcodeSemantics {
    derived(opcode, register, OpcodeEffect::FunctionResult {
        argument,
    })
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Opcodes that change the type of a register.
pub const OPCODE_SEMANTICS: &[OpcodeSemantics] = &[
    // Literal loads.
    fixed("Integer", Register::P2, ColumnType::Integer),
    fixed("Int64", Register::P2, ColumnType::Integer),
    fixed("Real", Register::P2, ColumnType::Real),
    fixed("String", Register::P2, ColumnType::Text),
    fixed("String8", Register::P2, ColumnType::Text),
    fixed("Blob", Register::P2, ColumnType::Blob),
    fixed("IntCopy", Register::P2, ColumnType::Integer),
    // Column fetches.
    derived("Column", Register::P3, OpcodeEffect::ColumnFetch),
    derived("VColumn", Register::P3, OpcodeEffect::ColumnFetch),
    // Expressions.
    fixed("Concat", Register::P3, ColumnType::Text),
    derived("Add", Register::P3, OpcodeEffect::Arithmetic),
    derived("Subtract", Register::P3, OpcodeEffect::Arithmetic),
    derived("Multiply", Register::P3, OpcodeEffect::Arithmetic),
    derived("Divide", Register::P3, OpcodeEffect::Arithmetic),
    derived("Remainder", Register::P3, OpcodeEffect::Arithmetic),
    fixed("BitAnd", Register::P3, ColumnType::Integer),
    fixed("BitOr", Register::P3, ColumnType::Integer),
    fixed("ShiftLeft", Register::P3, ColumnType::Integer),
    fixed("ShiftRight", Register::P3, ColumnType::Integer),
    fixed("BitNot", Register::P2, ColumnType::Integer),
    fixed("And", Register::P3, ColumnType::Integer),
    fixed("Or", Register::P3, ColumnType::Integer),
    fixed("Not", Register::P2, ColumnType::Integer),
    // Counters and row identifiers.
    fixed("Count", Register::P2, ColumnType::Integer),
    fixed("Rowid", Register::P2, ColumnType::Integer),
    fixed("VRowid", Register::P2, ColumnType::Integer),
    fixed("Sequence", Register::P2, ColumnType::Integer),
    // Casts.
    derived("Cast", Register::P1, OpcodeEffect::CastAffinity),
    // Function calls. Aggregates carry the argument type through the
    // accumulator register.
    call("Function", Register::P3, Register::P2),
    call("PureFunc", Register::P3, Register::P2),
    call("AggStep", Register::P3, Register::P2),
    call("AggFinal", Register::P1, Register::P1),
    call("AggValue", Register::P3, Register::P1),
];

/// Returns the semantics entry for `opcode`, if it affects typing.
#[must_use]
pub fn opcode_semantics(opcode: &str) -> Option<&'static OpcodeSemantics> {
    OPCODE_SEMANTICS.iter().find(|entry| entry.opcode == opcode)
}

/// Returns the result type of a built-in SQL function.
#[must_use]
pub fn function_type(name: &str) -> Option<FunctionType> {
    let column_type = match name.to_ascii_lowercase().as_str() {
        "upper" | "lower" | "trim" | "ltrim" | "rtrim" | "substr" | "substring" | "replace"
        | "hex" | "quote" | "printf" | "format" | "typeof" | "char" | "group_concat"
        | "string_agg" | "sqlite_version" | "sqlite_source_id" | "date" | "time"
        | "datetime" | "strftime" | "soundex" | "concat" | "concat_ws" | "json"
        | "json_array" | "json_object" | "json_quote" | "json_type" => ColumnType::Text,
        "length" | "octet_length" | "instr" | "unicode" | "count" | "random" | "changes"
        | "total_changes" | "last_insert_rowid" | "unixepoch" | "json_valid"
        | "json_array_length" | "row_number" | "rank" | "dense_rank" | "ntile" => {
            ColumnType::Integer
        }
        "avg" | "total" | "julianday" | "round" | "pi" | "percent_rank" | "cume_dist" => {
            ColumnType::Real
        }
        "randomblob" | "zeroblob" | "unhex" | "jsonb" => ColumnType::Blob,
        "max" | "min" | "sum" | "abs" | "ifnull" | "coalesce" | "nullif" | "likely"
        | "unlikely" | "likelihood" | "first_value" | "last_value" | "nth_value" | "lag"
        | "lead" => return Some(FunctionType::FirstArgument),
        _ => return None,
    };
    Some(FunctionType::Fixed(column_type))
}

/// Returns the type of a numeric operation on operands of the given types.
///
/// A real operand makes the result real; two integers stay integer. Any other
/// combination is left untyped.
#[must_use]
pub const fn arithmetic_type(
    lhs: Option<ColumnType>,
    rhs: Option<ColumnType>,
) -> Option<ColumnType> {
    match (lhs, rhs) {
        (Some(ColumnType::Real), _) | (_, Some(ColumnType::Real)) => Some(ColumnType::Real),
        (Some(ColumnType::Integer), Some(ColumnType::Integer)) => Some(ColumnType::Integer),
        _ => None,
    }
}

/// Returns the type produced by a cast to the given SQLite affinity code.
#[must_use]
pub const fn affinity_type(code: i64) -> Option<ColumnType> {
    match code {
        0x41 => Some(ColumnType::Blob),
        0x42 => Some(ColumnType::Text),
        0x44 => Some(ColumnType::Integer),
        0x45 => Some(ColumnType::Real),
        _ => None,
    }
}

/// Extracts the function name from a P4 operand such as `upper(1)`.
#[must_use]
pub fn function_name(p4: &str) -> Option<&str> {
    let head = p4.split('(').next()?;
    let name = head.rsplit([',', ' ']).next()?.trim();
    if name.is_empty() { None } else { Some(name) }
}
