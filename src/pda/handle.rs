// バス受信側とボタン要求側で共有するPDA
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::{Frame, KeyRequest, UnknownKey};
use crate::pda::{Panel, ScreenBuffer, StatusFlags};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 1電文の処理、1要求の処理はそれぞれロックを取ったまま行う
#[derive(Debug, Clone)]
pub struct PdaHandle(Arc<Mutex<Panel>>);

impl PdaHandle {
    pub fn new(panel: Panel) -> Self {
        PdaHandle(Arc::new(Mutex::new(panel)))
    }

    fn lock(&self) -> MutexGuard<'_, Panel> {
        // 保持中にパニックしても画面はそのまま使う
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ボタン名で要求する
    pub fn request_key(&self, name: &str) -> Result<KeyRequest, UnknownKey> {
        let request = name.parse::<KeyRequest>()?;
        self.lock().request(request);
        Ok(request)
    }

    pub fn request(&self, request: KeyRequest) {
        self.lock().request(request)
    }

    /// 画面のHTML
    pub fn render_screen(&self) -> String {
        self.lock().screen().render_html()
    }

    /// 画面のテキスト
    pub fn render_text(&self) -> String {
        self.lock().screen().render_text()
    }

    pub fn current_status(&self) -> StatusFlags {
        self.lock().status().clone()
    }

    pub fn screen_snapshot(&self) -> ScreenBuffer {
        self.lock().screen().clone()
    }

    pub fn node_id(&self) -> u8 {
        self.lock().node_id()
    }

    pub fn dispatch(&self, frame: &Frame) -> Option<Frame> {
        self.lock().handle_frame(frame)
    }
}

#[test]
fn test1() {
    use crate::aqualink::{Key, PDA_ADDRESS};
    let handle = PdaHandle::new(Panel::default());
    let bus = handle.clone();

    assert_eq!(
        handle.request_key("jets"),
        Err(UnknownKey("jets".to_string()))
    );
    assert_eq!(handle.request_key("back"), Ok(KeyRequest::Key(Key::Back)));

    let reply = std::thread::spawn(move || bus.dispatch(&Frame::new(PDA_ADDRESS, 0x02, &[])))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(reply.payload, vec![0x40, Key::Back.code()]);

    handle.dispatch(&Frame::new(PDA_ADDRESS, 0x04, b"\x05POOL MODE    ON\x00"));
    assert!(handle.current_status().pool_mode);
    assert_eq!(handle.screen_snapshot().line(5), Some("POOL MODE    ON "));
    assert!(handle.render_screen().contains("POOL MODE    ON "));
    assert!(handle.render_text().contains("|POOL MODE    ON |"));
}
