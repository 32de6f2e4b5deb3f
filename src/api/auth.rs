//! IDプロバイダ向けOAuth設定とスコープ管理。

use anyhow::Result;
use std::{future::Future, pin::Pin, result::Result as StdResult};
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::authenticator_delegate::{DefaultInstalledFlowDelegate, InstalledFlowDelegate};
use yup_oauth2::{
    DefaultHyperClientBuilder, HyperClientBuilder, InstalledFlowAuthenticator,
    InstalledFlowReturnMethod,
};

use super::token_store::DiskTokenCache;

/// アプリ全体で使うAuthenticator型。
pub type InstalledAuth =
    Authenticator<<DefaultHyperClientBuilder as HyperClientBuilder>::Connector>;

#[derive(Copy, Clone)]
/// ブラウザ起動後、標準のフロー処理へ委譲するデリゲート。
struct InstalledFlowBrowserDelegate;

/// サインインURLをブラウザで開き、標準のインストールフローへ委譲する。
async fn browser_user_url(url: &str, need_code: bool) -> StdResult<String, String> {
    // ブラウザ起動の失敗はフォールバック入力があるため無視する。
    let _ = webbrowser::open(url);
    // 既定のフローでユーザー入力を促す。
    let def_delegate = DefaultInstalledFlowDelegate;
    def_delegate.present_user_url(url, need_code).await
}

impl InstalledFlowDelegate for InstalledFlowBrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = StdResult<String, String>> + Send + 'a>> {
        // 非同期でブラウザ起動→コード取得を行う。
        Box::pin(browser_user_url(url, need_code))
    }
}

/// ファイル保存型トークンキャッシュでAuthenticatorを構築する。
///
/// クライアントシークレットは設定で指定されたパスから読み込む。
pub async fn authenticator(credentials_path: &str, token_cache_path: &str) -> Result<InstalledAuth> {
    // IDプロバイダのクライアント情報を読み込む。
    let secret = yup_oauth2::read_application_secret(credentials_path).await?;

    // トークン保存先を準備する。
    let cache = DiskTokenCache::new(token_cache_path);

    // Installed Flow用のAuthenticatorを構築する。
    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .with_storage(Box::new(cache))
        .flow_delegate(Box::new(InstalledFlowBrowserDelegate))
        .build()
        .await?;

    Ok(auth)
}

/// サインインに要求するOAuthスコープ。
///
/// ウォレットAPIはこのトークンをBearerとして受け付ける。
pub fn scopes() -> Vec<&'static str> {
    vec!["openid", "email", "profile"]
}
