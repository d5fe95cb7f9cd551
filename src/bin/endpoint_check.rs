//! 部署后的接口自检
//!
//! 用法：`endpoint_check <base_url> <email> <secret> [demo_url]`

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;

const DEFAULT_DEMO_URL: &str = "https://tds-llm-analysis.s-anand.net/demo";

#[derive(Debug, PartialEq)]
struct CheckArgs {
    base_url: String,
    email: String,
    secret: String,
    demo_url: String,
}

/// 解析命令行参数；第一个参数是程序名，可能不存在
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CheckArgs> {
    let program = args.next().unwrap_or_else(|| "endpoint_check".to_string());
    let args: Vec<String> = args.collect();
    if args.len() < 3 {
        bail!("用法: {} <base_url> <email> <secret> [demo_url]", program);
    }
    Ok(CheckArgs {
        base_url: args[0].trim_end_matches('/').to_string(),
        email: args[1].clone(),
        secret: args[2].clone(),
        demo_url: args.get(3).cloned().unwrap_or_else(|| DEFAULT_DEMO_URL.to_string()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let CheckArgs {
        base_url,
        email,
        secret,
        demo_url,
    } = parse_args(std::env::args())?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(200))
        .build()
        .context("创建 HTTP 客户端失败")?;

    println!("{}", "=".repeat(60));
    println!("接口自检: {}", base_url);
    println!("{}", "=".repeat(60));

    let checks = vec![
        ("Health Check", check_health(&client, &base_url).await),
        ("Invalid JSON", check_invalid_json(&client, &base_url).await),
        ("Invalid Secret", check_invalid_secret(&client, &base_url, &email).await),
        (
            "Demo Quiz",
            check_demo_quiz(&client, &base_url, &email, &secret, &demo_url).await,
        ),
    ];

    println!("\n{}", "=".repeat(60));
    let mut passed = 0;
    for (name, result) in &checks {
        match result {
            Ok(()) => {
                passed += 1;
                println!("✓ PASS - {}", name);
            }
            Err(e) => println!("✗ FAIL - {}: {:#}", name, e),
        }
    }
    println!("\n通过: {}/{}", passed, checks.len());
    println!("{}", "=".repeat(60));

    if passed != checks.len() {
        std::process::exit(1);
    }
    Ok(())
}

async fn check_health(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client.get(format!("{}/health", base_url)).send().await?;
    expect_status(response.status(), 200)
}

async fn check_invalid_json(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client
        .post(format!("{}/quiz", base_url))
        .header("Content-Type", "application/json")
        .body("invalid json")
        .send()
        .await?;
    expect_status(response.status(), 400)
}

async fn check_invalid_secret(client: &reqwest::Client, base_url: &str, email: &str) -> Result<()> {
    let response = client
        .post(format!("{}/quiz", base_url))
        .json(&json!({"email": email, "secret": "wrong-secret", "url": "https://example.com/test"}))
        .send()
        .await?;
    expect_status(response.status(), 403)
}

async fn check_demo_quiz(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    secret: &str,
    demo_url: &str,
) -> Result<()> {
    println!("\n运行示例题目（可能需要几分钟）...");
    let response = client
        .post(format!("{}/quiz", base_url))
        .json(&json!({"email": email, "secret": secret, "url": demo_url}))
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;
    println!("响应: {}", body);
    expect_status(status, 200)
}

fn expect_status(status: reqwest::StatusCode, expected: u16) -> Result<()> {
    if status.as_u16() != expected {
        bail!("期望 {}，实际 {}", expected, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args_without_program_name() {
        let err = parse_args(args(&[])).unwrap_err();
        assert!(err.to_string().contains("endpoint_check"));
    }

    #[test]
    fn test_parse_args_requires_three_values() {
        assert!(parse_args(args(&["check", "http://localhost:8080", "a@b.c"])).is_err());
    }

    #[test]
    fn test_parse_args_defaults_demo_url() {
        let parsed = parse_args(args(&["check", "http://localhost:8080/", "a@b.c", "s3cret"])).unwrap();
        assert_eq!(parsed.base_url, "http://localhost:8080");
        assert_eq!(parsed.secret, "s3cret");
        assert_eq!(parsed.demo_url, DEFAULT_DEMO_URL);
    }
}
