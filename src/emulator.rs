// バス受信ループ
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::{Connector, Frame, FrameDecoder, Transport, hex_dump};
use crate::pda::PdaHandle;
use tokio_util::sync::CancellationToken;

const READ_BUFFER_SIZE: usize = 256;

/// 受信 → 電文の切り出し → 宛先の確認 → 画面更新 → 応答送信
///
/// バスは半二重なので1電文ずつ順番に処理する。
pub struct Emulator<C: Connector> {
    transport: Transport<C>,
    decoder: FrameDecoder,
    // Noneなら受信するだけで応答しない
    handle: Option<PdaHandle>,
}

impl<C: Connector> Emulator<C> {
    pub fn new(transport: Transport<C>, handle: PdaHandle) -> Self {
        Emulator {
            transport,
            decoder: FrameDecoder::new(),
            handle: Some(handle),
        }
    }

    /// バス上のすべての電文を記録するだけ
    pub fn sniffer(transport: Transport<C>) -> Self {
        Emulator {
            transport,
            decoder: FrameDecoder::new(),
            handle: None,
        }
    }

    /// 1回読み込んで処理する(受信したバイト数)
    pub fn poll_once(&mut self) -> usize {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = self.transport.read(&mut buf);
        if n == 0 {
            return 0;
        }
        tracing::trace!(target:"<-Rx", "[{}]", hex_dump(&buf[..n]));
        for result in self.decoder.feed(&buf[..n]) {
            match result {
                Ok(frame) => self.on_frame(&frame),
                Err(e) => tracing::warn!("{}", e),
            }
        }
        n
    }

    fn on_frame(&mut self, frame: &Frame) {
        let Some(handle) = self.handle.as_ref() else {
            tracing::info!("{}", frame);
            return;
        };
        tracing::trace!(target:"<-Rx", "{}", frame);
        if let Some(reply) = handle.dispatch(frame) {
            let wire = reply.encode();
            tracing::trace!(target:"Tx->", "{} [{}]", reply, hex_dump(&wire));
            if self.transport.write(&wire) != wire.len() {
                tracing::warn!("reply dropped: {}", reply);
            }
        }
    }

    /// 取り消されるまで動く
    pub fn run(&mut self, cancel: &CancellationToken) {
        tracing::info!("bus loop started");
        while !cancel.is_cancelled() {
            self.poll_once();
        }
        tracing::info!("bus loop stopped");
    }
}

#[cfg(test)]
fn wire_emulator(
    failures: usize,
) -> (
    std::sync::Arc<std::sync::Mutex<crate::aqualink::transport::mock::Wire>>,
    PdaHandle,
    Emulator<crate::aqualink::transport::mock::MockConnector>,
) {
    use crate::aqualink::transport::mock::{MockConnector, Wire};
    use crate::pda::Panel;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    let wire = Arc::new(Mutex::new(Wire::default()));
    let transport = Transport::new(MockConnector::new(Arc::clone(&wire), failures), Duration::ZERO);
    let handle = PdaHandle::new(Panel::default());
    let emulator = Emulator::new(transport, handle.clone());
    (wire, handle, emulator)
}

#[test]
fn test1() {
    use crate::aqualink::{Key, MASTER_ADDRESS, PDA_ADDRESS};
    use crate::pda::ack_frame;

    let (wire, handle, mut emulator) = wire_emulator(1);
    {
        let mut wire = wire.lock().unwrap();
        // ゴミ, 他のノード宛て, 自分宛ての書き込み(2回に分けて届く)
        let mut bytes = vec![0x00, 0x55, 0x00];
        bytes.extend(Frame::new(0x40, 0x02, &[]).encode());
        bytes.extend(Frame::new(PDA_ADDRESS, 0x04, b"\x01EQUIPMENT\x00").encode());
        let (a, b) = bytes.split_at(10);
        wire.rx.push_back(a.to_vec());
        wire.rx.push_back(b.to_vec());
    }
    // 1回目は接続失敗
    assert_eq!(emulator.poll_once(), 0);
    while emulator.poll_once() > 0 {}

    assert_eq!(handle.screen_snapshot().line(1), Some("EQUIPMENT       "));
    assert_eq!(
        wire.lock().unwrap().tx,
        ack_frame(MASTER_ADDRESS, Key::None).encode()
    );

    // 要求したボタンは次の応答で送る
    handle.request_key("up").unwrap();
    wire.lock().unwrap().tx.clear();
    wire.lock()
        .unwrap()
        .rx
        .push_back(Frame::new(PDA_ADDRESS, 0x02, &[]).encode());
    emulator.poll_once();
    assert_eq!(
        wire.lock().unwrap().tx,
        ack_frame(MASTER_ADDRESS, Key::Up).encode()
    );
}

#[test]
fn test2() {
    use crate::aqualink::PDA_ADDRESS;

    let (wire, _handle, mut emulator) = wire_emulator(0);
    // チェックサム不一致の電文には応答しない
    let mut bytes = Frame::new(PDA_ADDRESS, 0x02, &[]).encode();
    bytes[4] ^= 0x01;
    wire.lock().unwrap().rx.push_back(bytes);
    emulator.poll_once();
    assert!(wire.lock().unwrap().tx.is_empty());

    // 取り消し済みならすぐに戻る
    let cancel = CancellationToken::new();
    cancel.cancel();
    emulator.run(&cancel);
}

#[test]
fn test3() {
    use crate::aqualink::transport::mock::{MockConnector, Wire};
    use crate::aqualink::PDA_ADDRESS;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // 受信するだけ
    let wire = Arc::new(Mutex::new(Wire::default()));
    let transport = Transport::new(MockConnector::new(Arc::clone(&wire), 0), Duration::ZERO);
    let mut sniffer = Emulator::sniffer(transport);
    wire.lock()
        .unwrap()
        .rx
        .push_back(Frame::new(PDA_ADDRESS, 0x02, &[]).encode());
    assert!(sniffer.poll_once() > 0);
    assert!(wire.lock().unwrap().tx.is_empty());
}
