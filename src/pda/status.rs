// 画面の文字列から設備の状態を読み取る
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::{char, digit1, space0, space1};
use nom::combinator::{map_res, opt, rest};
use nom::sequence::terminated;
use nom::{IResult, Parser};
use serde::Serialize;

/// 設備の状態
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub pool_mode: bool,
    pub spa_mode: bool,
    pub pool_heater: bool,
    pub spa_heater: bool,
    pub heater: bool,
    pub pump: bool,
    pub pump_rpm: u16,
    pub pump_watts: u16,
    pub air_temp: u16,
    pub water_temp: u16,
}

// "POOL MODE    ON" などの 見出し + 空白 + 値
fn labeled<'a>(label: &'static str, input: &'a str) -> IResult<&'a str, &'a str> {
    let (s, _) = (space0, tag(label), space1).parse(input)?;
    let (s, value) = rest.parse(s)?;
    Ok((s, value.trim_end()))
}

fn number(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |s: &str| s.parse::<u16>()).parse(input)
}

// 4桁まで
fn number4(input: &str) -> IResult<&str, u16> {
    map_res(take_while_m_n(1, 4, |c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<u16>()
    })
    .parse(input)
}

// "75` 80`" 気温と水温(水温はポンプが動いているときだけ表示される)
fn temperatures(input: &str) -> IResult<&str, (u16, Option<u16>)> {
    let (s, _) = space0.parse(input)?;
    let (s, air) = terminated(number, char('`')).parse(s)?;
    let (s, _) = space1.parse(s)?;
    let (s, water) = opt(terminated(number, char('`'))).parse(s)?;
    Ok((s, (air, water)))
}

// "RPM: 2750" や "WATTS: 1100"
fn pump_value<'a>(label: &'static str, input: &'a str) -> IResult<&'a str, u16> {
    let (s, _) = (space0, tag(label), space1).parse(input)?;
    number4(s)
}

impl StatusFlags {
    /// 画面に書き込まれた1行で状態を更新する
    pub fn update(&mut self, text: &str) {
        if let Ok((_, value)) = labeled("POOL MODE", text) {
            if value == "ON" {
                self.pool_mode = true;
                self.spa_mode = false;
                self.pump = true;
            } else {
                self.pool_mode = false;
            }
        }
        if let Ok((_, value)) = labeled("SPA MODE", text) {
            if value == "ON" {
                self.spa_mode = true;
                self.pool_mode = false;
                self.pump = true;
            } else {
                self.spa_mode = false;
            }
        }
        if let Ok((_, value)) = labeled("POOL HEATER", text) {
            self.pool_heater = value == "ENA";
            if self.pool_heater {
                self.pump = true;
            }
        }
        if let Ok((_, value)) = labeled("SPA HEATER", text) {
            self.spa_heater = value == "ENA";
            if self.spa_heater {
                self.pump = true;
            }
        }
        if let Ok((_, (air, water))) = temperatures(text) {
            self.air_temp = air;
            self.water_temp = water.unwrap_or(0);
        }
        if let Ok((_, rpm)) = pump_value("RPM:", text) {
            self.pump_rpm = rpm;
        }
        if let Ok((_, watts)) = pump_value("WATTS:", text) {
            self.pump_watts = watts;
        }

        self.heater = self.pool_heater || self.spa_heater;
        // プールもスパも止まっていればポンプとヒーターも止まっている
        if !self.pool_mode && !self.spa_mode {
            self.pump = false;
            self.pump_rpm = 0;
            self.pump_watts = 0;
            self.heater = false;
        }
    }
}

#[test]
fn test1() {
    let mut status = StatusFlags::default();
    status.update("POOL MODE    ON");
    assert!(status.pool_mode);
    assert!(status.pump);
    assert!(!status.spa_mode);

    status.update("   RPM: 2750");
    status.update("   WATTS: 1100");
    status.update("POOL HEATER ENA");
    assert_eq!(status.pump_rpm, 2750);
    assert_eq!(status.pump_watts, 1100);
    assert!(status.pool_heater);
    assert!(status.heater);

    // 両方止まったらポンプ関係はすべて0
    status.update("POOL MODE   OFF");
    assert!(!status.pool_mode);
    assert!(!status.pump);
    assert!(!status.heater);
    assert_eq!(status.pump_rpm, 0);
    assert_eq!(status.pump_watts, 0);
}

#[test]
fn test2() {
    let mut status = StatusFlags::default();
    status.update("SPA MODE     ON  ");
    assert!(status.spa_mode);
    status.update("POOL MODE    ON");
    assert!(status.pool_mode);
    assert!(!status.spa_mode);
    status.update("SPA HEATER   OFF");
    assert!(!status.spa_heater);
    assert!(!status.heater);
    assert!(status.pump);
}

#[test]
fn test3() {
    let mut status = StatusFlags::default();
    status.update("  75` 80`");
    assert_eq!(status.air_temp, 75);
    assert_eq!(status.water_temp, 80);
    // 水温なし
    status.update("  68`    ");
    assert_eq!(status.air_temp, 68);
    assert_eq!(status.water_temp, 0);
    // 関係のない行は何も変えない
    status.update("EQUIPMENT");
    assert_eq!(status.air_temp, 68);
    assert_eq!(status, StatusFlags {
        air_temp: 68,
        ..Default::default()
    });
}

#[test]
fn test4() {
    let status = StatusFlags {
        pool_mode: true,
        pump: true,
        ..Default::default()
    };
    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains(r#""pool_mode":true"#));
    assert!(json.contains(r#""pump_rpm":0"#));
}
