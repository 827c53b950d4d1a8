//! Method table and symbol constant pool.

use super::writer::{pack_fields, PayloadWriter};
use crate::intern::Method;
use crate::utils::config::METHOD_FIELD_BITS;
use crate::utils::error::EncodeError;
use std::fmt::Write as _;

/// Low bits of the second method word holding the frame type
const FRAME_TYPE_BITS: u32 = 4;

/// Write one pair of 36-bit words per method, in id order.
///
/// **Public** - third section of the payload
///
/// # Errors
/// * `EncodeError::Overflow` - a symbol id needs more than 18 bits
pub fn encode_methods<'a, I>(out: &mut PayloadWriter, methods: I) -> Result<usize, EncodeError>
where
    I: IntoIterator<Item = &'a Method>,
{
    let mut count = 0;
    for method in methods {
        out.write_fixed36(pack_fields(
            u64::from(method.method_name),
            u64::from(method.class_name),
            METHOD_FIELD_BITS,
        )?)?;
        out.write_fixed36(pack_fields(
            u64::from(method.location),
            method.frame_type.code(),
            FRAME_TYPE_BITS,
        )?)?;
        count += 1;
    }
    Ok(count)
}

/// Render symbols as comma-terminated string literals.
///
/// The pool starts with `""` so that symbol id `n` is the n-th entry.
pub fn constant_pool<'a, I>(symbols: I) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut pool = String::from("\"\",");
    for symbol in symbols {
        push_literal(&mut pool, &String::from_utf8_lossy(symbol));
        pool.push(',');
    }
    pool
}

fn push_literal(pool: &mut String, text: &str) {
    pool.push('"');
    for c in text.chars() {
        match c {
            '\\' => pool.push_str("\\\\"),
            '"' => pool.push_str("\\\""),
            '<' => pool.push_str("\\u003c"),
            '\n' => pool.push_str("\\n"),
            '\t' => pool.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(pool, "\\u{:04x}", c as u32);
            }
            c => pool.push(c),
        }
    }
    pool.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::writer::decode::Reader;
    use crate::intern::FrameType;

    #[test]
    fn test_method_words() {
        let methods = [
            Method::new(3, 4, 12, FrameType::Jit),
            Method::new(1, 2, 0, FrameType::Kernel),
        ];
        let mut out = PayloadWriter::new();
        assert_eq!(encode_methods(&mut out, &methods).unwrap(), 2);

        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.fixed36(), 4 << 18 | 3);
        assert_eq!(reader.fixed36(), 12 << 4 | 1);
        assert_eq!(reader.fixed36(), 2 << 18 | 1);
        assert_eq!(reader.fixed36(), 5);
        assert!(reader.at_end());
    }

    #[test]
    fn test_symbol_id_overflow() {
        let methods = [Method::new(1 << 18, 1, 0, FrameType::Jit)];
        let mut out = PayloadWriter::new();
        assert_eq!(
            encode_methods(&mut out, &methods),
            Err(EncodeError::Overflow {
                value: 1 << 18,
                bits: 18
            })
        );
    }

    #[test]
    fn test_constant_pool() {
        let symbols: Vec<&[u8]> = vec![&b"main"[..], &b"java.lang.String"[..], &b""[..]];
        assert_eq!(
            constant_pool(symbols),
            r#""","main","java.lang.String","","#
        );
        assert_eq!(constant_pool(std::iter::empty::<&[u8]>()), r#""","#);
    }

    #[test]
    fn test_constant_pool_escaping() {
        let symbols: Vec<&[u8]> = vec![&b"<init>"[..], &b"a\"b\\c"[..], &b"tab\there\x01"[..]];
        assert_eq!(
            constant_pool(symbols),
            r#""","\u003cinit>","a\"b\\c","tab\there\u0001","#
        );
    }
}
