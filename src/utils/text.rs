use once_cell::sync::Lazy;
use regex::Regex;

/// 将每三位以逗号分隔的数字字符串转换成整数，如 "1,234" -> 1234
pub fn parse_grouped_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let mut res: i64 = 0;
    for part in s.split(',') {
        let n: i64 = part.trim().parse().ok()?;
        res = res * 1000 + n;
    }
    Some(res)
}

static PAREN_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([\d,]+)\)").expect("固定正则"));

/// 解析年度筛选项的计数标签，如 "(123)" -> 123
pub fn parse_paren_count(s: &str) -> Option<i64> {
    PAREN_NUM
        .captures(s.trim())
        .and_then(|c| parse_grouped_int(&c[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grouped_int() {
        assert_eq!(parse_grouped_int("123"), Some(123));
        assert_eq!(parse_grouped_int("1,234"), Some(1234));
        assert_eq!(parse_grouped_int("12,345,678"), Some(12345678));
        assert_eq!(parse_grouped_int(" 1,234 "), Some(1234));
        assert_eq!(parse_grouped_int(""), None);
        assert_eq!(parse_grouped_int("abc"), None);
    }

    #[test]
    fn test_parse_paren_count() {
        assert_eq!(parse_paren_count("(123)"), Some(123));
        assert_eq!(parse_paren_count("(1,234)"), Some(1234));
        assert_eq!(parse_paren_count(" (5) "), Some(5));
        assert_eq!(parse_paren_count("123"), None);
        assert_eq!(parse_paren_count("()"), None);
    }
}
