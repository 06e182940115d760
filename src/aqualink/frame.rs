// Aqualink RS485バスのフレーム
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
// 電文形式
// DLE STX DEST CMD PAYLOAD... CHECKSUM DLE ETX
//
// DEST から CHECKSUM までに現れる DLE(0x10) の直後には NUL(0x00) を挿入する。
// チェックサムは挿入前の DLE STX DEST CMD PAYLOAD の総和(mod 256)
//
use std::fmt;

pub const NUL: u8 = 0x00;
pub const DLE: u8 = 0x10;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;

/// 開始マーカー
pub const FRAME_START: [u8; 2] = [DLE, STX];
/// 終了マーカー
pub const FRAME_END: [u8; 2] = [DLE, ETX];

/// コントローラー(マスター)のアドレス
pub const MASTER_ADDRESS: u8 = 0x00;
/// エミュレートするPDAリモコンのアドレス
pub const PDA_ADDRESS: u8 = 0x60;
/// 応答電文のコマンド
pub const ACK_COMMAND: u8 = 0x01;
/// 応答電文ペイロードの上位バイト
pub const ACK_PREFIX: u8 = 0x40;

/// バス電文
#[derive(Clone, Eq, PartialEq)]
pub struct Frame {
    pub destination: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(destination: u8, command: u8, payload: &[u8]) -> Self {
        Frame {
            destination,
            command,
            payload: payload.to_vec(),
        }
    }

    /// エスケープ前の論理バイト列(チェックサムを含まない)
    fn logical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.payload.len());
        bytes.extend_from_slice(&FRAME_START);
        bytes.push(self.destination);
        bytes.push(self.command);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// 電文のチェックサム
    pub fn checksum(&self) -> u8 {
        checksum(&self.logical_bytes())
    }

    /// 送信用のバイト列にする
    pub fn encode(&self) -> Vec<u8> {
        let logical = self.logical_bytes();
        let sum = checksum(&logical);
        let mut wire = Vec::with_capacity(logical.len() + 8);
        wire.extend_from_slice(&FRAME_START);
        for &b in logical[FRAME_START.len()..].iter().chain([sum].iter()) {
            wire.push(b);
            if b == DLE {
                wire.push(NUL); // バイトスタッフィング
            }
        }
        wire.extend_from_slice(&FRAME_END);
        wire
    }
}

/// 総和(mod 256)
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// 16進ダンプ
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect::<String>()
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Frame {{ dest: {:02X}, cmd: {:02X}, payload: [{}] }}",
            self.destination,
            self.command,
            hex_dump(&self.payload)
        )
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "dest={:02x} cmd={:02x} args={}",
            self.destination,
            self.command,
            hex_dump(&self.payload).to_lowercase()
        )
    }
}

#[test]
fn test1() {
    // 応答電文 (40 00)
    let frame = Frame::new(MASTER_ADDRESS, ACK_COMMAND, &[ACK_PREFIX, 0x00]);
    let sum: u8 = 0x10 + 0x02 + 0x00 + 0x01 + 0x40 + 0x00;
    assert_eq!(frame.checksum(), sum);
    assert_eq!(
        frame.encode(),
        vec![0x10, 0x02, 0x00, 0x01, 0x40, 0x00, sum, 0x10, 0x03]
    );
}

#[test]
fn test2() {
    // ペイロード中のDLEはNULでスタッフィングされる
    let frame = Frame::new(PDA_ADDRESS, 0x04, &[0x01, DLE, b'A']);
    let wire = frame.encode();
    assert_eq!(&wire[..2], &FRAME_START);
    assert_eq!(&wire[2..8], &[0x60, 0x04, 0x01, DLE, NUL, b'A']);
    assert_eq!(&wire[wire.len() - 2..], &FRAME_END);
}

#[test]
fn test3() {
    // チェックサム自体がDLEになる場合もスタッフィングする
    // 0x10 + 0x02 + 0x00 + 0x0e = 0x20, 0x20 + 0xf0 = 0x10
    let frame = Frame::new(0x00, 0x0e, &[0xf0]);
    assert_eq!(frame.checksum(), DLE);
    assert_eq!(
        frame.encode(),
        vec![0x10, 0x02, 0x00, 0x0e, 0xf0, DLE, NUL, 0x10, 0x03]
    );
}

#[test]
fn test4() {
    let frame = Frame::new(0x60, 0x10, &[0x02, 0x00, 0x05]);
    assert_eq!(format!("{}", frame), "dest=60 cmd=10 args=020005");
    assert_eq!(hex_dump(&[0xab, 0x01]), "AB01");
}
