use std::io::BufRead;

/// Parses a hex-encoded APDU, ignoring spaces and case.
pub fn parse(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    hex::decode(cleaned)
}

/// Reads one hex-encoded APDU per line.
/// Blank lines and lines starting with `#` are skipped.
pub fn read_lines<R>(reader: R) -> crate::Result<Vec<Vec<u8>>>
where
    R: BufRead,
{
    let mut apdus = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        apdus.push(parse(line)?);
    }

    Ok(apdus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(vec![0x00, 0xA4, 0x04, 0x00], parse("00a40400").unwrap());
        assert_eq!(vec![0x00, 0xA4, 0x04, 0x00], parse("00 A4 04 00").unwrap());
        assert_eq!(Vec::<u8>::new(), parse("").unwrap());
        assert!(parse("0").is_err());
        assert!(parse("ZZ").is_err());
    }

    #[test]
    fn test_read_lines() {
        let input = b"# select\n00 A4 04 00\n\nFFFFFFFFFF\n" as &[u8];

        assert_eq!(
            vec![vec![0x00, 0xA4, 0x04, 0x00], vec![0xFF; 5]],
            read_lines(input).unwrap()
        );
    }

    #[test]
    fn test_read_lines_rejects_bad_hex() {
        let input = b"00A4\nnot hex\n" as &[u8];

        assert!(matches!(read_lines(input), Err(crate::Error::Hex(_))));
    }
}
