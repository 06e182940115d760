// RS485ポートの読み書きと再接続
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

/// 物理ポートを開く
pub trait Connector {
    type Port: io::Read + io::Write;

    fn connect(&mut self) -> io::Result<Self::Port>;

    /// ログ用の名前
    fn name(&self) -> &str;
}

/// シリアルポート
#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(device: &str, baud_rate: u32, read_timeout: Duration) -> Self {
        SerialConnector {
            device: device.to_owned(),
            baud_rate,
            read_timeout,
        }
    }
}

impl Connector for SerialConnector {
    type Port = Box<dyn SerialPort>;

    fn connect(&mut self) -> io::Result<Self::Port> {
        serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.read_timeout)
            .open()
            .map_err(io::Error::from)
    }

    fn name(&self) -> &str {
        &self.device
    }
}

/// バス送受信
///
/// 読み書きに失敗したらポートを閉じて、次回の読み書きで開き直す。
/// 失敗は受信0バイトとして扱い、呼び出し側には返さない。
pub struct Transport<C: Connector> {
    connector: C,
    port: Option<C::Port>,
    reconnect_delay: Duration,
}

impl<C: Connector> Transport<C> {
    pub fn new(connector: C, reconnect_delay: Duration) -> Self {
        Transport {
            connector,
            port: None,
            reconnect_delay,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> Option<&mut C::Port> {
        if self.port.is_none() {
            match self.connector.connect() {
                Ok(port) => {
                    tracing::info!(r#""{}" opened"#, self.connector.name());
                    self.port = Some(port);
                }
                Err(e) => {
                    tracing::warn!(r#"couldn't open "{}": {}"#, self.connector.name(), e);
                    // 再接続を繰り返してCPUを占有しないように待つ
                    thread::sleep(self.reconnect_delay);
                }
            }
        }
        self.port.as_mut()
    }

    fn disconnect(&mut self, e: &io::Error) {
        tracing::warn!(r#""{}" i/o failed, reconnecting: {}"#, self.connector.name(), e);
        self.port = None;
    }

    /// 受信する(タイムアウトまたは失敗時は0)
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(port) = self.port() else {
            return 0;
        };
        match port.read(buf) {
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                0 // タイムアウトエラーは無視する
            }
            Err(e) => {
                self.disconnect(&e);
                0
            }
        }
    }

    /// 送信する(書き込んだバイト数、失敗時は0)
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let Some(port) = self.port() else {
            return 0;
        };
        match port.write_all(bytes).and_then(|_| port.flush()) {
            Ok(()) => bytes.len(),
            Err(e) => {
                self.disconnect(&e);
                0
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Connector;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// テスト用の読み書き
    #[derive(Debug, Default)]
    pub struct Wire {
        pub rx: VecDeque<Vec<u8>>,
        pub tx: Vec<u8>,
        pub fail_next_read: bool,
    }

    pub struct MockPort(pub Arc<Mutex<Wire>>);

    impl io::Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut wire = self.0.lock().unwrap();
            if wire.fail_next_read {
                wire.fail_next_read = false;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            match wire.rx.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        wire.rx.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl io::Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// 指定回数だけ接続に失敗する
    pub struct MockConnector {
        pub wire: Arc<Mutex<Wire>>,
        pub failures: usize,
        pub connects: usize,
    }

    impl MockConnector {
        pub fn new(wire: Arc<Mutex<Wire>>, failures: usize) -> Self {
            MockConnector {
                wire,
                failures,
                connects: 0,
            }
        }
    }

    impl Connector for MockConnector {
        type Port = MockPort;

        fn connect(&mut self) -> io::Result<MockPort> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(io::ErrorKind::NotFound, "no device"));
            }
            self.connects += 1;
            Ok(MockPort(Arc::clone(&self.wire)))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}

#[test]
fn test1() {
    use mock::{MockConnector, Wire};
    use std::sync::{Arc, Mutex};

    let wire = Arc::new(Mutex::new(Wire::default()));
    wire.lock().unwrap().rx.push_back(vec![1, 2, 3]);
    let mut transport = Transport::new(MockConnector::new(Arc::clone(&wire), 1), Duration::ZERO);
    let mut buf = [0u8; 8];

    // 1回目は接続に失敗して0バイト
    assert_eq!(transport.read(&mut buf), 0);
    assert!(!transport.is_connected());
    // 2回目で接続して受信する
    assert_eq!(transport.read(&mut buf), 3);
    assert_eq!(&buf[..3], &[1, 2, 3]);
    // タイムアウトは0バイトで接続を維持する
    assert_eq!(transport.read(&mut buf), 0);
    assert!(transport.is_connected());
}

#[test]
fn test2() {
    use mock::{MockConnector, Wire};
    use std::sync::{Arc, Mutex};

    let wire = Arc::new(Mutex::new(Wire::default()));
    let mut transport = Transport::new(MockConnector::new(Arc::clone(&wire), 0), Duration::ZERO);
    let mut buf = [0u8; 8];

    assert_eq!(transport.write(&[0x10, 0x02]), 2);
    // 読み込み失敗で切断して、次の読み込みで開き直す
    wire.lock().unwrap().fail_next_read = true;
    assert_eq!(transport.read(&mut buf), 0);
    assert!(!transport.is_connected());
    wire.lock().unwrap().rx.push_back(vec![0x42]);
    assert_eq!(transport.read(&mut buf), 1);
    assert_eq!(transport.connector.connects, 2);
    assert_eq!(wire.lock().unwrap().tx, vec![0x10, 0x02]);
}
