//! 클라이언트 (수신측)
//!
//! Offer 수신 → TCP/UDP 워커를 동시에 모두 시작 → 전부 끝나면 다시 탐색.
//! 워커끼리 공유하는 가변 상태는 없고, 각자 결과를 보고한다.

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::discovery::{self, Offer};
use crate::stats::{TransferReport, Transport};
use crate::{tcp, udp, CancelRx, Config, Error, Result, TransferPlan};

/// 한 라운드의 결과
#[derive(Debug, Default)]
pub struct RoundSummary {
    /// 성공한 워커 결과 (완료 순서)
    pub reports: Vec<TransferReport>,

    /// 실패한 워커 수
    pub failures: usize,
}

impl RoundSummary {
    /// 끝난 워커 수 (성공 + 실패)
    pub fn completed(&self) -> usize {
        self.reports.len() + self.failures
    }

    pub fn reports_for(&self, transport: Transport) -> impl Iterator<Item = &TransferReport> {
        self.reports.iter().filter(move |r| r.transport == transport)
    }
}

/// [`Client::run`] 결과. 라운드 기록은 마지막 것만 남긴다.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// 끝까지 마친 라운드 수
    pub rounds: usize,

    pub last: Option<RoundSummary>,
}

/// bwprobe 클라이언트
pub struct Client {
    config: Config,
    plan: TransferPlan,
}

impl Client {
    pub fn new(config: Config, plan: TransferPlan) -> Self {
        Self { config, plan }
    }

    pub fn plan(&self) -> &TransferPlan {
        &self.plan
    }

    /// 모든 워커를 즉시 시작하고 전부 끝날 때까지 대기
    ///
    /// 워커 하나의 실패는 로그로 남기고 나머지에 영향을 주지 않는다.
    pub async fn run_round(&self, offer: &Offer) -> RoundSummary {
        let size = self.plan.file_size;
        let mut workers = JoinSet::new();

        for id in 1..=self.plan.tcp_connections {
            let addr = offer.tcp_addr();
            workers.spawn(async move {
                (Transport::Tcp, id, tcp::request_transfer(addr, size, id).await)
            });
            info!("TCP transfer #{} started", id);
        }

        for id in 1..=self.plan.udp_connections {
            let addr = offer.udp_addr();
            let config = self.config.clone();
            workers.spawn(async move {
                (Transport::Udp, id, udp::request_transfer(addr, size, id, &config).await)
            });
            info!("UDP transfer #{} started", id);
        }

        let mut summary = RoundSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, _, Ok(report))) => {
                    info!("{}", report.summary());
                    summary.reports.push(report);
                }
                Ok((transport, id, Err(e))) => {
                    warn!("Error during {} transfer #{}: {}", transport, id, e);
                    summary.failures += 1;
                }
                Err(e) => {
                    warn!("{}", Error::Join(e));
                    summary.failures += 1;
                }
            }
        }

        summary
    }

    /// 탐색과 전송 라운드를 반복
    ///
    /// `max_rounds`가 None이면 취소될 때까지 반복한다. 취소는 정상 종료,
    /// 탐색 타임아웃은 [`Error::DiscoveryTimeout`]으로 반환.
    pub async fn run(
        &self,
        mut cancel: CancelRx,
        max_rounds: Option<usize>,
    ) -> Result<RunSummary> {
        let mut run = RunSummary::default();

        while max_rounds.map_or(true, |max| run.rounds < max) {
            let offer = match discovery::listen_for_offer(&self.config, &mut cancel).await {
                Ok(offer) => offer,
                Err(Error::Cancelled) => break,
                Err(e) => return Err(e),
            };

            let summary = self.run_round(&offer).await;
            info!(
                "All transfers complete ({} ok, {} failed), listening to offer requests...",
                summary.reports.len(),
                summary.failures
            );
            run.rounds += 1;
            run.last = Some(summary);
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_empty_plan() {
        let client = Client::new(Config::loopback(0), TransferPlan::new(1024, 0, 0));
        let offer = Offer {
            server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            udp_port: 9,
            tcp_port: 9,
        };
        let summary = client.run_round(&offer).await;
        assert_eq!(summary.completed(), 0);
    }

    #[tokio::test]
    async fn test_failed_workers_counted() {
        // 닫힌 포트로 TCP 접속 → 실패해도 라운드는 끝난다
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = Client::new(Config::loopback(0), TransferPlan::new(1024, 2, 0));
        let offer = Offer {
            server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            udp_port: port,
            tcp_port: port,
        };
        let summary = client.run_round(&offer).await;
        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.failures, 2);
    }

    #[tokio::test]
    async fn test_run_cancelled_before_offer() {
        let mut config = Config::loopback(0);
        config.discovery_timeout_ms = None;
        let client = Client::new(config, TransferPlan::new(1024, 1, 1));
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(async move { client.run(rx, None).await });
        tx.send(true).unwrap();

        let run = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(run.rounds, 0);
        assert!(run.last.is_none());
    }
}
