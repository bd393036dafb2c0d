//! Natives provided by the command-line host

use jass_runtime::api::{FromJass, NativeError, NativeReturn, NativeTable, ToJass};
use jass_runtime::Value;
use std::io::Write;

fn arg<T: FromJass>(args: &[Value], index: usize) -> Result<T, NativeError> {
    let value = args.get(index).ok_or(NativeError::Arity {
        expected: index + 1,
        found: args.len(),
    })?;
    T::from_jass(value).map_err(|err| NativeError::ArgumentType {
        index,
        expected: err.expected,
        found: err.found,
    })
}

/// `R2S` renders three decimals
pub fn real_to_string(r: f32) -> String {
    format!("{:.3}", r)
}

/// `S2I` reads an optional sign and leading digits; anything else is 0
pub fn string_to_integer(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: i32 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.wrapping_mul(10).wrapping_add(i32::from(b - b'0'));
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Build the native table: `Print` writes one line per call to `out`
pub fn standard_natives<W: Write + 'static>(mut out: W) -> NativeTable {
    let mut natives = NativeTable::new();

    natives.register("Print", 1, move |args| {
        let text = match &args[0] {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        };
        writeln!(out, "{}", text).map_err(|e| NativeError::message(e.to_string()))?;
        Ok(NativeReturn::nothing())
    });

    natives.register("I2S", 1, |args| {
        let i: i32 = arg(args, 0)?;
        Ok(NativeReturn::Value(i.to_string().to_jass()))
    });

    natives.register("R2S", 1, |args| {
        let r: f32 = arg(args, 0)?;
        Ok(NativeReturn::Value(real_to_string(r).to_jass()))
    });

    natives.register("I2R", 1, |args| {
        let i: i32 = arg(args, 0)?;
        Ok(NativeReturn::Value((i as f32).to_jass()))
    });

    // Truncates toward zero; out-of-range reals saturate
    natives.register("R2I", 1, |args| {
        let r: f32 = arg(args, 0)?;
        Ok(NativeReturn::Value((r as i32).to_jass()))
    });

    natives.register("S2I", 1, |args| {
        let s: String = arg(args, 0)?;
        Ok(NativeReturn::Value(string_to_integer(&s).to_jass()))
    });

    natives
}

#[cfg(test)]
mod tests {
    use super::*;
    use jass_runtime::{NativeDispatch, NativeId};
    use pretty_assertions::assert_eq;

    fn call(natives: &mut NativeTable, name: &str, arg: Value) -> Result<Value, NativeError> {
        let id = (0..natives.len() as u32)
            .map(NativeId)
            .find(|id| natives.name(*id) == Some(name))
            .expect("native registered");
        natives.invoke(id, vec![arg]).map(|r| match r {
            NativeReturn::Value(v) | NativeReturn::Suspend(v) => v,
        })
    }

    #[test]
    fn test_string_to_integer() {
        assert_eq!(string_to_integer("42"), 42);
        assert_eq!(string_to_integer("  -17abc"), -17);
        assert_eq!(string_to_integer("+8"), 8);
        assert_eq!(string_to_integer("abc"), 0);
        assert_eq!(string_to_integer(""), 0);
    }

    #[test]
    fn test_real_to_string() {
        assert_eq!(real_to_string(1.5), "1.500");
        assert_eq!(real_to_string(-0.25), "-0.250");
    }

    #[test]
    fn test_conversions() {
        let mut natives = standard_natives(std::io::sink());
        assert_eq!(call(&mut natives, "I2S", Value::Integer(7)), Ok(Value::string("7")));
        assert_eq!(call(&mut natives, "I2R", Value::Integer(3)), Ok(Value::Real(3.0)));
        assert_eq!(call(&mut natives, "R2I", Value::Real(-2.9)), Ok(Value::Integer(-2)));
        assert_eq!(call(&mut natives, "R2S", Value::Integer(2)), Ok(Value::string("2.000")));
        assert_eq!(call(&mut natives, "S2I", Value::string("12")), Ok(Value::Integer(12)));
    }

    #[test]
    fn test_argument_type_error() {
        let mut natives = standard_natives(std::io::sink());
        assert_eq!(
            call(&mut natives, "I2S", Value::string("x")),
            Err(NativeError::ArgumentType {
                index: 0,
                expected: "integer",
                found: "string"
            })
        );
    }
}
