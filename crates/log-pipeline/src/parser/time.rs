//! 시간 템플릿 파서
//!
//! strptime 계열 템플릿으로 타임스탬프 문자열을 해석합니다.
//!
//! # 지원 토큰
//!
//! | 토큰 | 의미 |
//! |------|------|
//! | `%Y` | 4자리 연도 |
//! | `%m` `%d` `%H` `%M` `%S` | 2자리 월/일/시/분/초 |
//! | `%e` | 공백 패딩 일 (` 2`, `12`) |
//! | `%b` | 영문 월 약어 (`Jan` ~ `Dec`) |
//! | `%L`, `%f` | 가변 길이 소수 초 (나노초 단위로 절삭) |
//! | `%z` | `Z`, `+HHMM`, `+HH:MM`, `+HH` |
//! | `%%` | `%` 문자 |
//!
//! 그 밖의 `%x` 조합은 문자 그대로 일치해야 하는 리터럴입니다.
//! 템플릿에 시간대가 없으면 UTC로 간주하고, 연도가 없으면 현재 연도를 사용합니다.
//!
//! # 사용 예시
//! ```ignore
//! let format = TimeFormat::new("%Y-%m-%dT%H:%M:%S.%L%z");
//! let ts = format.parse("2021-12-02T23:36:42.555157Z")?;
//! assert_eq!(format.parse(&format.format(&ts))?, ts);
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::LogPipelineError;

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// 템플릿 토큰
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Year,
    Month,
    MonthAbbr,
    Day,
    DaySpacePadded,
    Hour,
    Minute,
    Second,
    Fraction,
    Offset,
    Literal(String),
}

/// 미리 토큰화된 시간 템플릿
///
/// 템플릿 자체는 실패하지 않습니다. 알 수 없는 토큰은 리터럴이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat {
    template: String,
    tokens: Vec<Token>,
}

impl TimeFormat {
    /// 템플릿을 토큰화합니다.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_owned(),
            tokens: tokenize(template),
        }
    }

    /// 원본 템플릿 문자열
    pub fn template(&self) -> &str {
        &self.template
    }

    /// 템플릿이 시간대 토큰을 포함하는지 여부
    pub fn has_offset(&self) -> bool {
        self.tokens.contains(&Token::Offset)
    }

    /// 문자열을 타임스탬프로 해석합니다.
    ///
    /// 템플릿과 한 글자라도 어긋나거나 입력이 남으면 에러를 반환합니다.
    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, LogPipelineError> {
        let mut cursor = Cursor::new(text);
        let mut parts = Parts::default();

        for token in &self.tokens {
            match token {
                Token::Year => parts.year = Some(cursor.fixed_digits(4, "year")? as i32),
                Token::Month => parts.month = cursor.fixed_digits(2, "month")?,
                Token::MonthAbbr => parts.month = cursor.month_abbr()?,
                Token::Day => parts.day = cursor.fixed_digits(2, "day")?,
                Token::DaySpacePadded => parts.day = cursor.space_padded_day()?,
                Token::Hour => parts.hour = cursor.fixed_digits(2, "hour")?,
                Token::Minute => parts.minute = cursor.fixed_digits(2, "minute")?,
                Token::Second => parts.second = cursor.fixed_digits(2, "second")?,
                Token::Fraction => parts.nanos = cursor.fraction()?,
                Token::Offset => parts.offset_secs = cursor.offset()?,
                Token::Literal(lit) => cursor.literal(lit)?,
            }
        }

        if !cursor.is_done() {
            return Err(cursor.error("unexpected trailing characters"));
        }

        parts.build(text)
    }

    /// 타임스탬프를 템플릿 형식으로 출력합니다 ([`parse`](Self::parse)의 역함수).
    ///
    /// 소수 초는 9자리, 시간대는 `+0000`으로 출력합니다.
    pub fn format(&self, ts: &DateTime<Utc>) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        for token in &self.tokens {
            // String에 대한 write!는 실패하지 않음
            let _ = match token {
                Token::Year => write!(out, "{:04}", ts.year()),
                Token::Month => write!(out, "{:02}", ts.month()),
                Token::MonthAbbr => out.write_str(MONTH_ABBR[ts.month0() as usize]),
                Token::Day => write!(out, "{:02}", ts.day()),
                Token::DaySpacePadded => write!(out, "{:>2}", ts.day()),
                Token::Hour => write!(out, "{:02}", ts.hour()),
                Token::Minute => write!(out, "{:02}", ts.minute()),
                Token::Second => write!(out, "{:02}", ts.second()),
                Token::Fraction => write!(out, "{:09}", ts.nanosecond() % 1_000_000_000),
                Token::Offset => out.write_str("+0000"),
                Token::Literal(lit) => out.write_str(lit),
            };
        }
        out
    }
}

/// 템플릿으로 문자열을 한 번 해석합니다.
pub fn parse_time(text: &str, template: &str) -> Result<DateTime<Utc>, LogPipelineError> {
    TimeFormat::new(template).parse(text)
}

fn tokenize(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        let token = match chars.next() {
            Some('Y') => Token::Year,
            Some('m') => Token::Month,
            Some('b') => Token::MonthAbbr,
            Some('d') => Token::Day,
            Some('e') => Token::DaySpacePadded,
            Some('H') => Token::Hour,
            Some('M') => Token::Minute,
            Some('S') => Token::Second,
            Some('L') | Some('f') => Token::Fraction,
            Some('z') => Token::Offset,
            Some('%') | None => {
                literal.push('%');
                continue;
            }
            Some(other) => {
                literal.push('%');
                literal.push(other);
                continue;
            }
        };
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(token);
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

#[derive(Debug)]
struct Parts {
    year: Option<i32>,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
    offset_secs: i32,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            year: None,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            nanos: 0,
            offset_secs: 0,
        }
    }
}

impl Parts {
    fn build(self, text: &str) -> Result<DateTime<Utc>, LogPipelineError> {
        let invalid = |reason: &str| LogPipelineError::Parse {
            format: "time".to_owned(),
            offset: 0,
            reason: format!("{reason}: '{text}'"),
        };

        let year = self.year.unwrap_or_else(|| Utc::now().year());
        let naive = NaiveDate::from_ymd_opt(year, self.month, self.day)
            .ok_or_else(|| invalid("invalid calendar date"))?
            .and_hms_nano_opt(self.hour, self.minute, self.second, self.nanos)
            .ok_or_else(|| invalid("invalid time of day"))?;
        let offset =
            FixedOffset::east_opt(self.offset_secs).ok_or_else(|| invalid("offset out of range"))?;
        let local = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| invalid("ambiguous local time"))?;
        Ok(local.with_timezone(&Utc))
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos == self.input.len()
    }

    fn error(&self, reason: &str) -> LogPipelineError {
        LogPipelineError::Parse {
            format: "time".to_owned(),
            offset: self.pos,
            reason: reason.to_owned(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn fixed_digits(&mut self, width: usize, what: &str) -> Result<u32, LogPipelineError> {
        let rest = self.rest().as_bytes();
        if rest.len() < width || !rest[..width].iter().all(u8::is_ascii_digit) {
            return Err(self.error(&format!("expected {width}-digit {what}")));
        }
        let value = rest[..width]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));
        self.pos += width;
        Ok(value)
    }

    fn space_padded_day(&mut self) -> Result<u32, LogPipelineError> {
        if self.peek() == Some(b' ') {
            self.pos += 1;
            return self.fixed_digits(1, "day");
        }
        self.fixed_digits(2, "day")
    }

    fn month_abbr(&mut self) -> Result<u32, LogPipelineError> {
        let rest = self.rest();
        let Some(candidate) = rest.get(..3) else {
            return Err(self.error("expected month abbreviation"));
        };
        match MONTH_ABBR
            .iter()
            .position(|m| m.eq_ignore_ascii_case(candidate))
        {
            Some(idx) => {
                self.pos += 3;
                Ok(idx as u32 + 1)
            }
            None => Err(self.error("expected month abbreviation")),
        }
    }

    /// 숫자가 끝날 때까지 읽고 앞 9자리만 나노초로 사용합니다.
    fn fraction(&mut self) -> Result<u32, LogPipelineError> {
        let digits = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return Err(self.error("expected fractional seconds"));
        }
        let bytes = &self.rest().as_bytes()[..digits];
        let mut nanos = 0u32;
        for i in 0..9 {
            let digit = bytes.get(i).map_or(0, |b| u32::from(b - b'0'));
            nanos = nanos * 10 + digit;
        }
        self.pos += digits;
        Ok(nanos)
    }

    fn offset(&mut self) -> Result<i32, LogPipelineError> {
        let sign = match self.peek() {
            Some(b'Z') | Some(b'z') => {
                self.pos += 1;
                return Ok(0);
            }
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Err(self.error("expected timezone offset")),
        };
        self.pos += 1;
        let hours = self.fixed_digits(2, "offset hours")?;
        if self.peek() == Some(b':') {
            self.pos += 1;
        }
        let minutes = if self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.fixed_digits(2, "offset minutes")?
        } else {
            0
        };
        if hours > 23 || minutes > 59 {
            return Err(self.error("timezone offset out of range"));
        }
        Ok(sign * (hours as i32 * 3600 + minutes as i32 * 60))
    }

    fn literal(&mut self, lit: &str) -> Result<(), LogPipelineError> {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{lit}'")))
        }
    }
}
