//! analyze サブコマンド
//!
//! ルーターの決定ログとシャードのリクエストログ（JSON Lines）を集計する。
//! `kubectl logs --prefix` 形式の `[pod/x/y] ` プレフィックスやJSON以外の行は読み飛ばす。

use anyhow::Context;
use clap::Args;
use serde::{de::DeserializeOwned, Serialize};
use shardlb_common::protocol::{DecisionRecord, ShardLogRecord};
use shardlb_common::types::{EndpointKind, ShardId};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// analyze サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Router decision log (JSON lines)
    #[arg(long)]
    pub router: PathBuf,

    /// Shard request log captured with the baseline router
    #[arg(long, requires = "policy")]
    pub baseline: Option<PathBuf>,

    /// Shard request log captured with the sticky router
    #[arg(long, requires = "baseline")]
    pub policy: Option<PathBuf>,

    /// Print summaries as JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// エンドポイントごとのダイバート集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiversionStats {
    /// リクエスト数
    pub count: usize,
    /// ダイバート数
    pub diverted: usize,
    /// ダイバート率
    pub rate: f64,
}

/// シャードごとの選択集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShardSelectionStats {
    /// 選択回数
    pub count: usize,
    /// スティッキー経路の回数
    pub sticky: usize,
    /// 負荷スコア L の母標準偏差
    pub load_stdev: f64,
}

/// 決定ログの集計結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouterSummary {
    /// 全体のリクエスト数
    pub total: usize,
    /// 全体のダイバート率
    pub diversion_rate: f64,
    /// スティッキー経路の割合
    pub sticky_rate: f64,
    /// エンドポイントごとのダイバート集計
    pub endpoints: BTreeMap<String, DiversionStats>,
    /// シャードごとの選択集計
    pub shards: BTreeMap<ShardId, ShardSelectionStats>,
}

/// エンドポイントごとのレイテンシ集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointLatency {
    /// 行数
    pub count: usize,
    /// `latency_ms` の無い行数
    pub errors: usize,
    /// p50レイテンシ（ミリ秒）
    pub p50: Option<f64>,
    /// p95レイテンシ（ミリ秒）
    pub p95: Option<f64>,
    /// キャッシュヒット率
    pub hit_ratio: f64,
}

/// シャードログの集計結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShardSummary {
    /// エンドポイントごとの集計
    pub endpoints: BTreeMap<String, EndpointLatency>,
}

/// ベースラインとポリシーの比較（片方にしか無いエンドポイントも含む）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointComparison {
    /// ベースラインのp95（ミリ秒）
    pub baseline_p95: Option<f64>,
    /// ポリシーのp95（ミリ秒）
    pub policy_p95: Option<f64>,
    /// p95の変化率（%、負なら改善）
    pub p95_delta_pct: Option<f64>,
    /// ベースラインのヒット率
    pub baseline_hit_ratio: f64,
    /// ポリシーのヒット率
    pub policy_hit_ratio: f64,
    /// ヒット率の倍率（ポリシー / ベースライン）
    pub hit_ratio_multiplier: Option<f64>,
    /// ルーターログ上のダイバート率
    pub diversion_rate: f64,
}

/// エンドポイントごとの合格基準
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriteriaTarget {
    /// 対象エンドポイント
    pub endpoint: EndpointKind,
    /// 必要なp95改善率（%）
    pub min_p95_improvement_pct: f64,
    /// 必要なヒット率倍率
    pub min_hit_multiplier: f64,
}

/// 合格基準の一覧
pub const CRITERIA_TARGETS: [CriteriaTarget; 3] = [
    CriteriaTarget {
        endpoint: EndpointKind::Auth,
        min_p95_improvement_pct: 40.0,
        min_hit_multiplier: 2.0,
    },
    CriteriaTarget {
        endpoint: EndpointKind::Features,
        min_p95_improvement_pct: 50.0,
        min_hit_multiplier: 2.5,
    },
    CriteriaTarget {
        endpoint: EndpointKind::Document,
        min_p95_improvement_pct: 35.0,
        min_hit_multiplier: 2.0,
    },
];

/// 全体ダイバート率の上限（未満で合格）
pub const MAX_DIVERSION_RATE: f64 = 0.10;

/// エンドポイントごとの判定結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointVerdict {
    /// 判定に使った基準
    pub target: CriteriaTarget,
    /// p95改善率（%）
    pub p95_improvement_pct: Option<f64>,
    /// ヒット率倍率
    pub hit_multiplier: Option<f64>,
    /// p95基準を満たすか
    pub p95_ok: bool,
    /// ヒット率基準を満たすか
    pub hit_ok: bool,
    /// 両ログにp95が揃っていない
    pub insufficient_data: bool,
}

/// 合否判定
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaReport {
    /// エンドポイントごとの判定
    pub endpoints: Vec<EndpointVerdict>,
    /// 全体のダイバート率
    pub diversion_rate: f64,
    /// ダイバート率が上限未満か
    pub diversion_ok: bool,
    /// すべての基準を満たしたか
    pub passed: bool,
}

/// 読み込めた行数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RowCounts {
    /// ルーターログ
    pub router: usize,
    /// ベースラインのシャードログ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<usize>,
    /// ポリシーのシャードログ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<usize>,
}

/// ログファイルのバイト列を文字列にする
///
/// UTF-8（BOM可）、UTF-16（BOMが無ければリトルエンディアン）、Latin-1 の順に試す。
pub fn decode_log_bytes(raw: &[u8]) -> String {
    let body = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_string();
    }
    if let Some(text) = decode_utf16(raw) {
        return text;
    }
    raw.iter().map(|&byte| char::from(byte)).collect()
}

fn decode_utf16(raw: &[u8]) -> Option<String> {
    if raw.len() % 2 != 0 {
        return None;
    }
    let (body, big_endian) = match raw {
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        _ => (raw, false),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

/// JSON Lines を読み込み、解釈できた行だけを返す
///
/// 各行は最初の `{` から解釈する。
pub fn parse_json_lines<T: DeserializeOwned>(text: &str) -> Vec<T> {
    text.lines()
        .filter_map(|line| {
            let start = line.find('{')?;
            serde_json::from_str(line[start..].trim_end()).ok()
        })
        .collect()
}

/// 線形補間によるパーセンタイル（`p` は 0.0〜1.0）
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// 母標準偏差（要素数0なら0）
pub fn population_stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// 決定ログを集計する
pub fn summarize_router(records: &[DecisionRecord]) -> RouterSummary {
    let mut endpoints: BTreeMap<String, DiversionStats> = BTreeMap::new();
    let mut loads: BTreeMap<ShardId, Vec<f64>> = BTreeMap::new();
    let mut shards: BTreeMap<ShardId, ShardSelectionStats> = BTreeMap::new();
    let mut diverted = 0;
    let mut sticky = 0;

    for record in records {
        let stats = endpoints
            .entry(record.endpoint.as_str().to_string())
            .or_default();
        stats.count += 1;
        if record.diverted {
            stats.diverted += 1;
            diverted += 1;
        }

        let shard = shards.entry(record.selected_shard).or_default();
        shard.count += 1;
        if record.sticky_used {
            shard.sticky += 1;
            sticky += 1;
        }
        loads
            .entry(record.selected_shard)
            .or_default()
            .push(record.load);
    }

    for stats in endpoints.values_mut() {
        stats.rate = ratio(stats.diverted, stats.count);
    }
    for (shard, values) in &loads {
        if let Some(stats) = shards.get_mut(shard) {
            stats.load_stdev = population_stdev(values);
        }
    }

    RouterSummary {
        total: records.len(),
        diversion_rate: ratio(diverted, records.len()),
        sticky_rate: ratio(sticky, records.len()),
        endpoints,
        shards,
    }
}

/// シャードログを集計する
pub fn summarize_shard(records: &[ShardLogRecord]) -> ShardSummary {
    let mut grouped: BTreeMap<String, Vec<&ShardLogRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.endpoint.as_str().to_string())
            .or_default()
            .push(record);
    }

    let endpoints = grouped
        .into_iter()
        .map(|(endpoint, rows)| {
            let latencies: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.latency_ms.map(|ms| ms as f64))
                .collect();
            let hits = rows.iter().filter(|r| r.cache_hit).count();
            let summary = EndpointLatency {
                count: rows.len(),
                errors: rows.len() - latencies.len(),
                p50: percentile(&latencies, 0.50),
                p95: percentile(&latencies, 0.95),
                hit_ratio: ratio(hits, rows.len()),
            };
            (endpoint, summary)
        })
        .collect();

    ShardSummary { endpoints }
}

/// ベースラインとポリシーをエンドポイントごとに比較する
///
/// どちらかのログに現れたエンドポイントはすべて含める。
pub fn compare(
    baseline: &ShardSummary,
    policy: &ShardSummary,
    router: &RouterSummary,
) -> BTreeMap<String, EndpointComparison> {
    let endpoints: std::collections::BTreeSet<&String> = baseline
        .endpoints
        .keys()
        .chain(policy.endpoints.keys())
        .collect();

    endpoints
        .into_iter()
        .map(|endpoint| {
            let base = baseline.endpoints.get(endpoint);
            let pol = policy.endpoints.get(endpoint);
            let baseline_p95 = base.and_then(|b| b.p95);
            let policy_p95 = pol.and_then(|p| p.p95);
            let baseline_hit_ratio = base.map_or(0.0, |b| b.hit_ratio);
            let policy_hit_ratio = pol.map_or(0.0, |p| p.hit_ratio);

            let p95_delta_pct = match (baseline_p95, policy_p95) {
                (Some(b), Some(p)) if b != 0.0 => Some((p - b) / b * 100.0),
                _ => None,
            };
            let hit_ratio_multiplier =
                (baseline_hit_ratio > 0.0).then(|| policy_hit_ratio / baseline_hit_ratio);

            (
                endpoint.clone(),
                EndpointComparison {
                    baseline_p95,
                    policy_p95,
                    p95_delta_pct,
                    baseline_hit_ratio,
                    policy_hit_ratio,
                    hit_ratio_multiplier,
                    diversion_rate: router.endpoints.get(endpoint).map_or(0.0, |d| d.rate),
                },
            )
        })
        .collect()
}

fn judge_endpoint(
    target: CriteriaTarget,
    baseline: &ShardSummary,
    policy: &ShardSummary,
) -> EndpointVerdict {
    let key = target.endpoint.as_str();
    let base = baseline.endpoints.get(key);
    let pol = policy.endpoints.get(key);

    let (Some(base), Some(pol)) = (base, pol) else {
        return insufficient(target);
    };
    let (Some(base_p95), Some(pol_p95)) = (base.p95, pol.p95) else {
        return insufficient(target);
    };
    if base_p95 == 0.0 {
        return insufficient(target);
    }

    let improvement = (base_p95 - pol_p95) / base_p95 * 100.0;
    let multiplier = (base.hit_ratio > 0.0).then(|| pol.hit_ratio / base.hit_ratio);
    EndpointVerdict {
        target,
        p95_improvement_pct: Some(improvement),
        hit_multiplier: multiplier,
        p95_ok: improvement >= target.min_p95_improvement_pct,
        hit_ok: multiplier.is_some_and(|m| m >= target.min_hit_multiplier),
        insufficient_data: false,
    }
}

fn insufficient(target: CriteriaTarget) -> EndpointVerdict {
    EndpointVerdict {
        target,
        p95_improvement_pct: None,
        hit_multiplier: None,
        p95_ok: false,
        hit_ok: false,
        insufficient_data: true,
    }
}

/// 合格基準で判定する
///
/// 全エンドポイントのp95改善率とヒット率倍率、全体ダイバート率がすべて基準を満たせば合格。
pub fn evaluate_criteria(
    baseline: &ShardSummary,
    policy: &ShardSummary,
    router: &RouterSummary,
) -> CriteriaReport {
    let endpoints: Vec<EndpointVerdict> = CRITERIA_TARGETS
        .iter()
        .map(|target| judge_endpoint(*target, baseline, policy))
        .collect();
    let diversion_ok = router.diversion_rate < MAX_DIVERSION_RATE;
    let passed = diversion_ok && endpoints.iter().all(|v| v.p95_ok && v.hit_ok);

    CriteriaReport {
        endpoints,
        diversion_rate: router.diversion_rate,
        diversion_ok,
        passed,
    }
}

fn format_ms(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}ms"))
        .unwrap_or_else(|| "-".to_string())
}

/// 決定ログの集計をテキストで表示する
pub fn render_router(summary: &RouterSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "router: {} decisions, diversion {:.2}%, sticky {:.2}%",
        summary.total,
        summary.diversion_rate * 100.0,
        summary.sticky_rate * 100.0
    );
    for (endpoint, stats) in &summary.endpoints {
        let _ = writeln!(
            out,
            "  endpoint {endpoint:<9} count={:<6} diverted={:<6} rate={:.2}%",
            stats.count,
            stats.diverted,
            stats.rate * 100.0
        );
    }
    for (shard, stats) in &summary.shards {
        let _ = writeln!(
            out,
            "  shard    {:<9} count={:<6} sticky={:<6} L_stdev={:.4}",
            shard.as_str(),
            stats.count,
            stats.sticky,
            stats.load_stdev
        );
    }
    out
}

/// シャードログの集計をテキストで表示する
pub fn render_shard(label: &str, summary: &ShardSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{label}:");
    for (endpoint, stats) in &summary.endpoints {
        let _ = writeln!(
            out,
            "  {endpoint:<9} count={:<6} errors={:<4} p50={:<10} p95={:<10} hit_ratio={:.3}",
            stats.count,
            stats.errors,
            format_ms(stats.p50),
            format_ms(stats.p95),
            stats.hit_ratio
        );
    }
    out
}

fn format_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}

/// 読み込み行数を表示する
pub fn render_counts(counts: &RowCounts) -> String {
    let mut out = format!("counts: router rows={}", counts.router);
    if let Some(baseline) = counts.baseline {
        let _ = write!(out, " baseline rows={baseline}");
    }
    if let Some(policy) = counts.policy {
        let _ = write!(out, " policy rows={policy}");
    }
    out.push('\n');
    out
}

/// 比較結果をテキストで表示する
pub fn render_comparison(comparison: &BTreeMap<String, EndpointComparison>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "policy vs baseline:");
    let _ = writeln!(
        out,
        "  {:<9} {:>10} {:>10} {:>8} {:>8} {:>8} {:>6} {:>8}",
        "endpoint", "base_p95", "pol_p95", "delta%", "base_hit", "pol_hit", "xhit", "div_rate"
    );
    for (endpoint, cmp) in comparison {
        let _ = writeln!(
            out,
            "  {endpoint:<9} {:>10} {:>10} {:>8} {:>8.3} {:>8.3} {:>6} {:>8.3}",
            format_opt(cmp.baseline_p95, 1),
            format_opt(cmp.policy_p95, 1),
            format_opt(cmp.p95_delta_pct, 1),
            cmp.baseline_hit_ratio,
            cmp.policy_hit_ratio,
            format_opt(cmp.hit_ratio_multiplier, 2),
            cmp.diversion_rate
        );
    }
    out
}

/// 合否判定をテキストで表示する
pub fn render_criteria(report: &CriteriaReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "criteria:");
    for v in &report.endpoints {
        let endpoint = v.target.endpoint.as_str();
        if v.insufficient_data {
            let _ = writeln!(out, "  {endpoint:<9} insufficient data");
            continue;
        }
        let _ = writeln!(
            out,
            "  {endpoint:<9} p95_impr={}% (>= {}%) {}  xhit={} (>= {}) {}",
            format_opt(v.p95_improvement_pct, 1),
            v.target.min_p95_improvement_pct,
            verdict(v.p95_ok),
            format_opt(v.hit_multiplier, 2),
            v.target.min_hit_multiplier,
            verdict(v.hit_ok)
        );
    }
    let _ = writeln!(
        out,
        "  diversion {:.3} (< {MAX_DIVERSION_RATE}) {}",
        report.diversion_rate,
        verdict(report.diversion_ok)
    );
    let _ = writeln!(
        out,
        "RESULT: {}",
        if report.passed {
            "PASS (all criteria met)"
        } else {
            "FAIL (one or more criteria not met)"
        }
    );
    out
}

fn read_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    Ok(parse_json_lines(&decode_log_bytes(&raw)))
}

/// JSON出力用の集計一式
#[derive(Debug, Serialize)]
struct AnalysisReport {
    counts: RowCounts,
    router: RouterSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<ShardSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<ShardSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<BTreeMap<String, EndpointComparison>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    criteria: Option<CriteriaReport>,
}

/// analyze サブコマンドを実行し、レポート文字列を返す
pub fn execute(args: &AnalyzeArgs) -> anyhow::Result<String> {
    let decisions: Vec<DecisionRecord> = read_records(&args.router)?;
    let router = summarize_router(&decisions);
    let mut counts = RowCounts {
        router: decisions.len(),
        ..RowCounts::default()
    };

    let shard_summaries = match (&args.baseline, &args.policy) {
        (Some(baseline), Some(policy)) => {
            let baseline_rows = read_records::<ShardLogRecord>(baseline)?;
            let policy_rows = read_records::<ShardLogRecord>(policy)?;
            counts.baseline = Some(baseline_rows.len());
            counts.policy = Some(policy_rows.len());
            Some((summarize_shard(&baseline_rows), summarize_shard(&policy_rows)))
        }
        _ => None,
    };

    if args.json {
        let mut report = AnalysisReport {
            counts,
            router,
            baseline: None,
            policy: None,
            comparison: None,
            criteria: None,
        };
        if let Some((baseline, policy)) = shard_summaries {
            report.comparison = Some(compare(&baseline, &policy, &report.router));
            report.criteria = Some(evaluate_criteria(&baseline, &policy, &report.router));
            report.baseline = Some(baseline);
            report.policy = Some(policy);
        }
        return serde_json::to_string_pretty(&report).context("Failed to encode report");
    }

    let mut out = render_counts(&counts);
    out.push_str(&render_router(&router));
    if let Some((baseline, policy)) = shard_summaries {
        out.push_str(&render_shard("baseline", &baseline));
        out.push_str(&render_shard("policy", &policy));
        out.push_str(&render_comparison(&compare(&baseline, &policy, &router)));
        out.push_str(&render_criteria(&evaluate_criteria(&baseline, &policy, &router)));
    }
    Ok(out)
}
