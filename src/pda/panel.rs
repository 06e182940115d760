// PDAリモコンのエミュレーション(受信電文の処理と応答)
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::{Command, Frame, KeyRequest, MASTER_ADDRESS, PDA_ADDRESS, hex_dump};
use crate::bus_settings::{BusSettings, Firmware, LineRemapEntry};
use crate::pda::{PendingReply, ScreenBuffer, ScrollDirection, StatusFlags, ack_frame};

/// 画面と状態と保留中の応答
#[derive(Debug, Clone)]
pub struct Panel {
    screen: ScreenBuffer,
    status: StatusFlags,
    pending: PendingReply,
    node_id: u8,
    master_id: u8,
    line_remap: Vec<LineRemapEntry>,
}

// 行の文字列はNULまで
fn line_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

impl Panel {
    pub fn new(node_id: u8, master_id: u8, line_remap: Vec<LineRemapEntry>) -> Self {
        Panel {
            screen: ScreenBuffer::new(),
            status: StatusFlags::default(),
            pending: PendingReply::None,
            node_id,
            master_id,
            line_remap,
        }
    }

    pub fn from_settings(settings: &BusSettings) -> Self {
        Self::new(settings.NodeId, settings.MasterId, settings.line_remap())
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    pub fn pending(&self) -> &PendingReply {
        &self.pending
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    fn remap(&self, code: u8) -> usize {
        self.line_remap
            .iter()
            .find(|e| e.Code == code)
            .map_or(code as usize, |e| e.Line)
    }

    /// 受信した電文を処理して、応答電文を返す
    ///
    /// 宛先が自分でない電文には応答しない。
    pub fn handle_frame(&mut self, frame: &Frame) -> Option<Frame> {
        if frame.destination != self.node_id {
            return None;
        }
        let command = Command::from(frame.command);
        self.apply(command, &frame.payload);
        let key = self.pending.next_key(command, &self.screen);
        Some(ack_frame(self.master_id, key))
    }

    fn apply(&mut self, command: Command, payload: &[u8]) {
        let result = match (command, payload) {
            (Command::Probe | Command::Poll | Command::Handshake | Command::Boot, _) => Ok(()),
            (Command::WriteLine, [code, text @ ..]) => {
                let line = self.remap(*code);
                let text = line_text(text);
                tracing::trace!(target:"<-Rx", "line {}: \"{}\"", line, text);
                let result = self.screen.write_line(line, &text);
                // 表示できなかった行は状態に反映しない
                if result.is_ok() {
                    self.status.update(&text);
                }
                result
            }
            (Command::InvertLine, [line, ..]) => self.screen.invert_line(*line as usize),
            (Command::ClearScreen, _) => {
                self.screen.clear();
                Ok(())
            }
            (Command::Scroll, [start, end, direction, ..]) => {
                match ScrollDirection::from_byte(*direction) {
                    Some(d) => self.screen.scroll(*start as usize, *end as usize, d),
                    None => Ok(()),
                }
            }
            (Command::InvertChars, [line, start, end, ..]) => {
                self.screen
                    .invert_chars(*line as usize, *start as usize, *end as usize)
            }
            (Command::Unknown(code), _) => {
                tracing::warn!(
                    "UNKNOWN MESSAGE: dest={:02X} cmd={:02X} args={}",
                    self.node_id,
                    code,
                    hex_dump(payload)
                );
                Ok(())
            }
            (command, _) => {
                tracing::warn!("{} payload too short: {}", command, hex_dump(payload));
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!("{} ignored: {}", command, e);
        }
    }

    /// ボタン要求を受け付ける(保留中の応答は置き換える)
    pub fn request(&mut self, request: KeyRequest) {
        match request {
            KeyRequest::Key(key) => {
                tracing::info!("key request: {}", key);
                self.pending = PendingReply::SingleKey(key);
            }
            KeyRequest::Macro(m) => {
                tracing::info!("macro request: {:?} {:?}", m, m.targets());
                self.pending = PendingReply::Macro(m.into());
            }
            KeyRequest::Status => {
                let s = &self.status;
                tracing::info!(
                    "poolmode={} spamode={} heater={} pump={} pumprpm={} pumpwatts={} air={} water={}",
                    s.pool_mode,
                    s.spa_mode,
                    s.heater,
                    s.pump,
                    s.pump_rpm,
                    s.pump_watts,
                    s.air_temp,
                    s.water_temp
                );
                tracing::info!(
                    "current line = {:?} - [{}]",
                    self.screen.cursor(),
                    self.screen.cursor_line().unwrap_or_default()
                );
                if let Err(e) = self.screen.write_line(0, "Status!") {
                    tracing::warn!("{}", e);
                }
            }
        }
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new(PDA_ADDRESS, MASTER_ADDRESS, Firmware::default().line_remap())
    }
}

#[cfg(test)]
fn write_frame(code: u8, text: &str) -> Frame {
    let mut payload = vec![code];
    payload.extend_from_slice(text.as_bytes());
    payload.push(0x00);
    Frame::new(PDA_ADDRESS, 0x04, &payload)
}

#[test]
fn test1() {
    use crate::aqualink::decode;
    // 画面消去のあとのポーリングには空の応答を返す
    let mut panel = Panel::default();
    panel.handle_frame(&write_frame(0x03, "EQUIPMENT"));
    panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x08, &[0x03]));

    let wire = Frame::new(PDA_ADDRESS, 0x09, &[]).encode();
    let clear = decode(&wire).unwrap().unwrap();
    let reply = panel.handle_frame(&clear).unwrap();
    assert_eq!(reply, ack_frame(MASTER_ADDRESS, crate::aqualink::Key::None));
    assert!(panel.screen().lines().iter().all(|s| s.trim().is_empty()));
    assert_eq!(panel.screen().highlight(), None);
    assert_eq!(panel.screen().cursor(), None);

    let reply = panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x02, &[])).unwrap();
    assert_eq!(reply.encode(), vec![0x10, 0x02, 0x00, 0x01, 0x40, 0x00, 0x53, 0x10, 0x03]);
}

#[test]
fn test2() {
    let mut panel = Panel::default();
    // 宛先が違う
    assert_eq!(panel.handle_frame(&Frame::new(0x40, 0x02, &[])), None);
    // 未知のコマンドにも応答する
    assert!(panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x33, &[1, 2])).is_some());
    // 範囲外の行は無視する
    assert!(panel.handle_frame(&write_frame(0x0c, "BAD")).is_some());
    assert!(panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x08, &[0x20])).is_some());
    assert_eq!(panel.screen().cursor(), None);
    // 短すぎるペイロードも無視する
    assert!(panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x0f, &[1])).is_some());
}

#[test]
fn test3() {
    // 時刻行と温度行の読み替え
    let mut panel = Panel::default();
    panel.handle_frame(&write_frame(0x40, "10:42 AM"));
    panel.handle_frame(&write_frame(0x82, "  75` 80`"));
    assert_eq!(panel.screen().line(0), Some("10:42 AM        "));
    assert_eq!(panel.screen().line(2), Some("  75` 80`       "));
    assert_eq!(panel.status().air_temp, 75);

    let mut legacy = Panel::new(PDA_ADDRESS, MASTER_ADDRESS, Firmware::Legacy.line_remap());
    legacy.handle_frame(&write_frame(0x40, "10:42 AM"));
    assert_eq!(legacy.screen().line(1), Some("10:42 AM        "));
}

#[test]
fn test4() {
    use crate::aqualink::Key;
    let mut panel = Panel::default();
    panel.handle_frame(&write_frame(0x01, "POOL MODE    OFF"));
    panel.handle_frame(&write_frame(0x02, "SPA MODE     OFF"));
    panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x08, &[0x01]));

    panel.request("spamode".parse().unwrap());
    // 書き込み電文ではマクロを進めない
    let reply = panel.handle_frame(&write_frame(0x03, "EQUIPMENT")).unwrap();
    assert_eq!(reply.payload, vec![0x40, Key::None.code()]);
    let reply = panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x02, &[])).unwrap();
    assert_eq!(reply.payload, vec![0x40, Key::Down.code()]);
    panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x08, &[0x02]));
    let reply = panel.handle_frame(&Frame::new(PDA_ADDRESS, 0x02, &[])).unwrap();
    assert_eq!(reply.payload, vec![0x40, Key::Select.code()]);
    assert_eq!(panel.pending(), &PendingReply::None);

    panel.handle_frame(&write_frame(0x02, "SPA MODE      ON"));
    assert!(panel.status().spa_mode);
    assert!(panel.status().pump);

    panel.request(KeyRequest::Status);
    assert_eq!(panel.screen().line(0), Some("Status!         "));
}

#[test]
fn test5() {
    // 範囲外の行に書かれた状態は反映しない
    let mut panel = Panel::default();
    assert!(panel.handle_frame(&write_frame(0x0c, "POOL MODE    ON")).is_some());
    assert_eq!(panel.status(), &StatusFlags::default());
    assert!(panel.screen().lines().iter().all(|s| s.trim().is_empty()));
    // 範囲内なら反映する
    panel.handle_frame(&write_frame(0x01, "POOL MODE    ON"));
    assert!(panel.status().pool_mode);
}
