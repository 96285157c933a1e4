//! Приведение сырых значений к каноническим строкам по виду телеметрии.
//!
//! Стратегия выбирается профилем вендора ([`KindStrategy`]), а изменяемое
//! состояние сессии (смещение индекса, корреляция портов) передаётся явно
//! через [`SessionContext`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IndexShape, PortCorrelationTable, TelemetryKind};
use crate::error::DecodeError;
use crate::snmp::{OidPath, RawValue, VariableBinding};

/// Значения "нет сигнала" в MIB вендоров
pub const POWER_SENTINELS: [&str; 2] = ["2147483647", "65535"];

/// Префиксы семейств портов, после которых вставляется `/`
const PORT_FAMILIES: [&str; 4] = ["EPON0", "EPON1", "EPON2", "EPON3"];

/// Формат значения оптической мощности.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerFormat {
    /// Уже в dBm (число или строка)
    #[default]
    Plain,
    /// Целое в десятых долях dBm
    Tenths,
    /// Строка вида `"0.03 mW (-14.62 dBm)"`
    MilliwattComposite,
}

/// Откуда берётся индекс записи мощности.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerIndex {
    /// Индекс из OID, как у остальных таблиц
    #[default]
    Table,
    /// Имя порта `<prefix><a>:<b>` из двух последних компонент OID,
    /// индекс ищется в таблице корреляции
    Correlated { port_prefix: String },
}

/// Правило смещения индексов таблицы MAC относительно таблицы дескрипторов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetRule {
    #[default]
    None,
    /// Смещение = первый индекс, увиденный при обходе дескрипторов
    FirstDescriptorIndex,
}

/// Состояние одной сессии опроса. Заполняется только обходом дескрипторов.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub index_offset: Option<i64>,
    pub correlation: PortCorrelationTable,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Учитывает одну строку таблицы дескрипторов.
    pub fn observe_descriptor(
        &mut self,
        rule: OffsetRule,
        name: &str,
        index: &str,
    ) -> Result<(), DecodeError> {
        if rule == OffsetRule::FirstDescriptorIndex && self.index_offset.is_none() {
            let offset = index.parse::<i64>().map_err(|_| {
                DecodeError::unexpected(
                    TelemetryKind::IfDescr,
                    format!("индекс '{index}' не годится для смещения"),
                )
            })?;
            debug!(offset, "index offset initialised");
            self.index_offset = Some(offset);
        }
        self.correlation.put(name, index);
        Ok(())
    }
}

/// Результат нормализации одной привязки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub if_index: String,
    pub value: String,
}

/// Стратегия нормализации для пары (вендор, вид телеметрии).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindStrategy {
    Descriptor { canonicalize: bool, offset: OffsetRule },
    Power { format: PowerFormat, index: PowerIndex },
    Mac { offset: OffsetRule },
    Status { code_offset: i64 },
}

impl KindStrategy {
    /// Нормализует привязку. Состояние сессии здесь только читается;
    /// дескрипторы дополнительно регистрируются через
    /// [`SessionContext::observe_descriptor`].
    pub fn normalize(
        &self,
        ctx: &SessionContext,
        root: &OidPath,
        shape: IndexShape,
        binding: &VariableBinding,
    ) -> Result<Normalized, DecodeError> {
        match self {
            KindStrategy::Descriptor { canonicalize, .. } => {
                let if_index = shape.resolve(root, &binding.oid)?;
                let text = descriptor_text(&binding.value)?;
                let value = if *canonicalize {
                    canonical_port_name(&text)
                } else {
                    text.into_owned()
                };
                Ok(Normalized { if_index, value })
            }
            KindStrategy::Power { format, index } => {
                let if_index = match index {
                    PowerIndex::Table => shape.resolve(root, &binding.oid)?,
                    PowerIndex::Correlated { port_prefix } => {
                        correlated_index(ctx, port_prefix, root, &binding.oid)?
                    }
                };
                let value = normalize_power(*format, &binding.value)?;
                Ok(Normalized { if_index, value })
            }
            KindStrategy::Mac { offset } => {
                let index = shape.resolve(root, &binding.oid)?;
                let value = normalize_mac(&binding.value)?;
                let if_index = match offset {
                    OffsetRule::None => index,
                    OffsetRule::FirstDescriptorIndex => apply_offset(ctx, &index)?,
                };
                Ok(Normalized { if_index, value })
            }
            KindStrategy::Status { code_offset } => {
                let if_index = shape.resolve(root, &binding.oid)?;
                let value = normalize_status(*code_offset, &binding.value)?;
                Ok(Normalized { if_index, value })
            }
        }
    }
}

fn descriptor_text(raw: &RawValue) -> Result<Cow<'_, str>, DecodeError> {
    match raw {
        RawValue::DisplayString(s) => Ok(Cow::Borrowed(s.as_str())),
        RawValue::OctetStringHex(bytes) => Ok(String::from_utf8_lossy(bytes)),
        other => Err(DecodeError::unexpected(
            TelemetryKind::IfDescr,
            format!("{other:?}"),
        )),
    }
}

/// Канонизирует имя порта из дескриптора.
///
/// `"EPON01ONU20 online"` → `"EPON01ONU20"` → `"EPON01:20"` → `"EPON0/1:20"`.
pub fn canonical_port_name(raw: &str) -> String {
    let head = match raw.find(char::is_whitespace) {
        Some(pos) if pos > 0 => &raw[..pos],
        _ => raw,
    };

    match head.find("ONU") {
        Some(pos) if pos > 0 => {
            let rewritten = head.replace("ONU", ":");
            for family in PORT_FAMILIES {
                if let Some(rest) = rewritten.strip_prefix(family) {
                    return format!("{family}/{rest}");
                }
            }
            rewritten
        }
        _ => head.to_string(),
    }
}

fn correlated_index(
    ctx: &SessionContext,
    port_prefix: &str,
    root: &OidPath,
    oid: &OidPath,
) -> Result<String, DecodeError> {
    let below = oid.strip_root(root).unwrap_or_default();
    if below.len() < 2 {
        return Err(DecodeError::MissingIndex {
            oid: oid.to_string(),
            root: root.to_string(),
        });
    }
    let tail = oid.suffix(2);
    let port = format!("{port_prefix}{}:{}", tail[0], tail[1]);
    ctx.correlation
        .get(&port)
        .map(str::to_string)
        .ok_or(DecodeError::UnknownPort(port))
}

fn apply_offset(ctx: &SessionContext, index: &str) -> Result<String, DecodeError> {
    let offset = ctx.index_offset.ok_or(DecodeError::OffsetUnknown)?;
    let raw = index.parse::<i64>().map_err(|_| {
        DecodeError::unexpected(
            TelemetryKind::Mac,
            format!("индекс '{index}' не число"),
        )
    })?;
    let corrected = raw
        .checked_add(offset)
        .ok_or_else(|| {
            DecodeError::unexpected(
                TelemetryKind::Mac,
                format!("индекс {raw} + смещение {offset}: переполнение"),
            )
        })?
        .to_string();

    if !ctx.correlation.is_empty() && !ctx.correlation.contains_index(&corrected) {
        return Err(DecodeError::UncorrelatedIndex(corrected));
    }
    Ok(corrected)
}

fn numeric_text(kind: TelemetryKind, raw: &RawValue) -> Result<Cow<'_, str>, DecodeError> {
    match raw {
        RawValue::Integer(v) => Ok(Cow::Owned(v.to_string())),
        RawValue::DisplayString(s) => Ok(Cow::Borrowed(s.trim())),
        other => Err(DecodeError::unexpected(kind, format!("{other:?}"))),
    }
}

pub fn normalize_power(format: PowerFormat, raw: &RawValue) -> Result<String, DecodeError> {
    let text = numeric_text(TelemetryKind::Power, raw)?;
    if POWER_SENTINELS.contains(&text.as_ref()) {
        return Ok("0".to_string());
    }

    match format {
        PowerFormat::Plain => {
            parse_dbm(&text)?;
            Ok(text.into_owned())
        }
        PowerFormat::Tenths => {
            let tenths = text.parse::<i64>().map_err(|_| {
                DecodeError::unexpected(TelemetryKind::Power, format!("'{text}' не целое число"))
            })?;
            Ok(format!("{:.1}", tenths as f64 / 10.0))
        }
        PowerFormat::MilliwattComposite => {
            // "<mW> mW (<dBm> dBm)"; пустое значение означает отсутствие сигнала
            let tokens: Vec<&str> = text.split_whitespace().collect();
            if tokens.len() < 3 {
                return Ok("0".to_string());
            }
            let dbm = tokens[2].replace('(', "");
            parse_dbm(&dbm)?;
            Ok(dbm)
        }
    }
}

fn parse_dbm(text: &str) -> Result<f64, DecodeError> {
    text.parse::<f64>().map_err(|_| {
        DecodeError::unexpected(TelemetryKind::Power, format!("'{text}' не значение dBm"))
    })
}

pub fn normalize_status(code_offset: i64, raw: &RawValue) -> Result<String, DecodeError> {
    let text = numeric_text(TelemetryKind::Status, raw)?;
    let code = text.parse::<i64>().map_err(|_| {
        DecodeError::unexpected(TelemetryKind::Status, format!("'{text}' не код статуса"))
    })?;
    code.checked_sub(code_offset)
        .map(|status| status.to_string())
        .ok_or_else(|| {
            DecodeError::unexpected(TelemetryKind::Status, format!("код {code} вне диапазона"))
        })
}

/// Собирает MAC вида `XX:XX:XX:XX:XX:XX` (ровно 17 символов). Текстовые
/// группы должны быть ровно по две hex-цифры.
pub fn normalize_mac(raw: &RawValue) -> Result<String, DecodeError> {
    let bytes: Vec<u8> = match raw {
        RawValue::OctetStringHex(bytes) if bytes.len() == 6 => bytes.clone(),
        // 6 печатных байт — это сырой MAC, а не текст
        RawValue::DisplayString(s) if s.len() == 6 => s.as_bytes().to_vec(),
        RawValue::DisplayString(s) => parse_mac_groups(s)
            .ok_or_else(|| DecodeError::unexpected(TelemetryKind::Mac, format!("'{s}'")))?,
        other => {
            return Err(DecodeError::unexpected(
                TelemetryKind::Mac,
                format!("{other:?}"),
            ));
        }
    };

    let mac = bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":");
    debug_assert_eq!(mac.len(), 17);
    Ok(mac)
}

fn parse_mac_groups(s: &str) -> Option<Vec<u8>> {
    let groups: Vec<&str> = s.trim().split([':', ' ']).collect();
    if groups.len() != 6 {
        return None;
    }
    groups
        .iter()
        .map(|g| {
            if g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()) {
                u8::from_str_radix(g, 16).ok()
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> OidPath {
        OidPath::parse(s).unwrap()
    }

    fn binding(o: &str, value: RawValue) -> VariableBinding {
        VariableBinding {
            oid: oid(o),
            value,
        }
    }

    fn text(s: &str) -> RawValue {
        RawValue::DisplayString(s.to_string())
    }

    #[test]
    fn mac_from_hex_octets() {
        let raw = RawValue::OctetStringHex(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(normalize_mac(&raw).unwrap(), "00:11:22:33:44:55");
    }

    #[test]
    fn mac_from_colon_text_is_uppercased() {
        assert_eq!(normalize_mac(&text("a0:b1:c2:d3:e4:f5")).unwrap(), "A0:B1:C2:D3:E4:F5");
        assert_eq!(normalize_mac(&text("a0 b1 c2 d3 e4 f5")).unwrap(), "A0:B1:C2:D3:E4:F5");
    }

    #[test]
    fn mac_from_printable_raw_bytes() {
        assert_eq!(normalize_mac(&text("ABCDEF")).unwrap(), "41:42:43:44:45:46");
    }

    #[test]
    fn malformed_mac_is_rejected() {
        for bad in ["00:11:22:33:44", "00:11:22:33:44:55:66", "zz:11:22:33:44:55", "", "001:1:22:33:44:55", "a:b:c:d:e:f", "0a:b:0c:0d:0e:0f", "+a:0b:0c:0d:0e:0f"] {
            assert!(normalize_mac(&text(bad)).is_err(), "{bad}");
        }
        assert!(normalize_mac(&RawValue::OctetStringHex(vec![1, 2, 3])).is_err());
        assert!(normalize_mac(&RawValue::Integer(5)).is_err());
    }

    #[test]
    fn power_sentinels_become_zero() {
        for format in [PowerFormat::Plain, PowerFormat::Tenths, PowerFormat::MilliwattComposite] {
            assert_eq!(normalize_power(format, &RawValue::Integer(2147483647)).unwrap(), "0");
            assert_eq!(normalize_power(format, &RawValue::Integer(65535)).unwrap(), "0");
        }
    }

    #[test]
    fn power_in_tenths() {
        assert_eq!(normalize_power(PowerFormat::Tenths, &RawValue::Integer(215)).unwrap(), "21.5");
        assert_eq!(normalize_power(PowerFormat::Tenths, &RawValue::Integer(-250)).unwrap(), "-25.0");
        assert!(normalize_power(PowerFormat::Tenths, &text("n/a")).is_err());
    }

    #[test]
    fn power_from_composite_string() {
        let got = normalize_power(PowerFormat::MilliwattComposite, &text("0.03 mW (-14.62 dBm)"));
        assert_eq!(got.unwrap(), "-14.62");
        assert_eq!(normalize_power(PowerFormat::MilliwattComposite, &text("")).unwrap(), "0");
        assert!(normalize_power(PowerFormat::MilliwattComposite, &text("0.03 mW (bad dBm)")).is_err());
    }

    #[test]
    fn plain_power_passes_numbers() {
        assert_eq!(normalize_power(PowerFormat::Plain, &text("-14.41")).unwrap(), "-14.41");
        assert_eq!(normalize_power(PowerFormat::Plain, &RawValue::Integer(-21)).unwrap(), "-21");
        assert!(normalize_power(PowerFormat::Plain, &text("offline")).is_err());
    }

    #[test]
    fn status_offset_is_subtracted() {
        assert_eq!(normalize_status(2, &RawValue::Integer(3)).unwrap(), "1");
        assert_eq!(normalize_status(2, &RawValue::Integer(4)).unwrap(), "2");
        assert_eq!(normalize_status(0, &RawValue::Integer(2)).unwrap(), "2");
        assert!(normalize_status(0, &text("up")).is_err());
    }

    #[test]
    fn status_code_out_of_range_is_rejected() {
        let err = normalize_status(2, &text("-9223372036854775808")).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedValue { kind: TelemetryKind::Status, .. }));
        assert_eq!(normalize_status(0, &text("-9223372036854775808")).unwrap(), "-9223372036854775808");
    }

    #[test]
    fn descriptor_rules_compose() {
        assert_eq!(canonical_port_name("EPON0ONU3 up"), "EPON0/:3");
        assert_eq!(canonical_port_name("EPON01ONU20 online"), "EPON0/1:20");
        assert_eq!(canonical_port_name("EPON31ONU7"), "EPON3/1:7");
        assert_eq!(canonical_port_name("GPON0/1:1"), "GPON0/1:1");
        assert_eq!(canonical_port_name("gpon-onu_1/1:3 x"), "gpon-onu_1/1:3");
        // ONU в начале строки не переписывается
        assert_eq!(canonical_port_name("ONU12"), "ONU12");
        assert_eq!(canonical_port_name(" EPON0ONU1"), " EPON0:1");
    }

    #[test]
    fn descriptor_registers_offset_once() {
        let mut ctx = SessionContext::new();
        ctx.observe_descriptor(OffsetRule::FirstDescriptorIndex, "EPON0/1", "100").unwrap();
        ctx.observe_descriptor(OffsetRule::FirstDescriptorIndex, "EPON0/1:1", "101").unwrap();
        assert_eq!(ctx.index_offset, Some(100));
        assert_eq!(ctx.correlation.get("EPON0/1:1"), Some("101"));

        let mut plain = SessionContext::new();
        plain.observe_descriptor(OffsetRule::None, "ge0/1", "7").unwrap();
        assert_eq!(plain.index_offset, None);
    }

    #[test]
    fn mac_index_is_offset_and_checked() {
        let mut ctx = SessionContext::new();
        for (name, idx) in [("EPON0/1", "100"), ("EPON0/1:1", "101"), ("EPON0/1:2", "102")] {
            ctx.observe_descriptor(OffsetRule::FirstDescriptorIndex, name, idx).unwrap();
        }
        let root = oid("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3");
        let strategy = KindStrategy::Mac { offset: OffsetRule::FirstDescriptorIndex };
        let mac = RawValue::OctetStringHex(vec![0xaa, 0xbb, 0xcc, 0, 1, 2]);

        let ok = strategy
            .normalize(&ctx, &root, IndexShape::Single, &binding("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3.2", mac.clone()))
            .unwrap();
        assert_eq!(ok.if_index, "102");
        assert_eq!(ok.value, "AA:BB:CC:00:01:02");

        let err = strategy
            .normalize(&ctx, &root, IndexShape::Single, &binding("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3.9", mac))
            .unwrap_err();
        assert_eq!(err, DecodeError::UncorrelatedIndex("109".into()));
    }

    #[test]
    fn mac_index_overflowing_offset_is_rejected() {
        let mut ctx = SessionContext::new();
        ctx.index_offset = Some(5);
        let root = oid("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3");
        let strategy = KindStrategy::Mac { offset: OffsetRule::FirstDescriptorIndex };
        let b = binding(
            "1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3.9223372036854775807",
            RawValue::OctetStringHex(vec![0; 6]),
        );
        let err = strategy.normalize(&ctx, &root, IndexShape::Single, &b).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedValue { kind: TelemetryKind::Mac, .. }));
    }

    #[test]
    fn mac_offset_without_descriptors_is_error() {
        let ctx = SessionContext::new();
        let root = oid("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3");
        let strategy = KindStrategy::Mac { offset: OffsetRule::FirstDescriptorIndex };
        let b = binding("1.3.6.1.4.1.37950.1.1.5.10.3.2.1.3.1", RawValue::OctetStringHex(vec![0; 6]));
        assert_eq!(
            strategy.normalize(&ctx, &root, IndexShape::Single, &b).unwrap_err(),
            DecodeError::OffsetUnknown
        );
    }

    #[test]
    fn correlated_power_uses_port_name() {
        let mut ctx = SessionContext::new();
        ctx.observe_descriptor(OffsetRule::None, "EPON0/2:3", "42").unwrap();
        let root = oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.8.1.7");
        let strategy = KindStrategy::Power {
            format: PowerFormat::MilliwattComposite,
            index: PowerIndex::Correlated { port_prefix: "EPON0/".into() },
        };

        let hit = binding("1.3.6.1.4.1.37950.1.1.5.12.2.1.8.1.7.2.3", text("0.02 mW (-17.17 dBm)"));
        let got = strategy.normalize(&ctx, &root, IndexShape::Single, &hit).unwrap();
        assert_eq!(got, Normalized { if_index: "42".into(), value: "-17.17".into() });

        let miss = binding("1.3.6.1.4.1.37950.1.1.5.12.2.1.8.1.7.8.32", text("0.03 mW (-15.93 dBm)"));
        assert_eq!(
            strategy.normalize(&ctx, &root, IndexShape::Single, &miss).unwrap_err(),
            DecodeError::UnknownPort("EPON0/8:32".into())
        );
    }

    #[test]
    fn descriptor_strategy_canonicalizes_when_asked() {
        let ctx = SessionContext::new();
        let root = oid("1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.2");
        let b = binding("1.3.6.1.4.1.37950.1.1.5.12.2.1.14.1.2.101", text("EPON01ONU1 online"));

        let on = KindStrategy::Descriptor { canonicalize: true, offset: OffsetRule::None };
        assert_eq!(on.normalize(&ctx, &root, IndexShape::Single, &b).unwrap().value, "EPON0/1:1");

        let off = KindStrategy::Descriptor { canonicalize: false, offset: OffsetRule::None };
        assert_eq!(off.normalize(&ctx, &root, IndexShape::Single, &b).unwrap().value, "EPON01ONU1 online");
    }
}
