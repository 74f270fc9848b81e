use anyhow::Result;
#[cfg(feature = "mock")]
use mockall::automock;
use trait_variant::make;

/// Runtime facts the wallet hook derives its back-end choice from.
///
/// Recomputed on demand; never cached across environment changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentFacts {
    pub is_web: bool,
    pub is_wallet_browser: bool,
    pub is_native_app: bool,
}

/// The two wallet back-ends the app can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletSource {
    Web,
    Mobile,
}

/// Decide which wallet back-end to use. Pure, no failure mode; the mobile
/// back-end is the safe default when nothing indicates a web context.
pub fn select_wallet_source(env: &EnvironmentFacts) -> WalletSource {
    if env.is_web || env.is_wallet_browser {
        WalletSource::Web
    } else {
        WalletSource::Mobile
    }
}

/// Capability set both wallet back-ends expose.
///
/// Concrete implementations live with the host app (wallet cryptography is
/// out of scope here). Selection happens once at hook construction via
/// [`select_wallet_source`], never by runtime type inspection.
#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait WalletBackend {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    fn selected_account(&self) -> Option<String>;

    fn connected(&self) -> bool;

    fn connecting(&self) -> bool;

    /// Sign `transaction` with the selected account and submit it, returning
    /// the transaction signature.
    async fn sign_and_send(&mut self, transaction: &[u8]) -> Result<String>;
}

/// Statically-dispatched pair of wallet back-ends.
pub enum SelectedWallet<W, M> {
    Web(W),
    Mobile(M),
}

impl<W, M> SelectedWallet<W, M> {
    pub fn source(&self) -> WalletSource {
        match self {
            Self::Web(_) => WalletSource::Web,
            Self::Mobile(_) => WalletSource::Mobile,
        }
    }
}

/// Pick the back-end for `env` at hook-construction time.
pub fn wallet_backend_for<W, M>(env: &EnvironmentFacts, web: W, mobile: M) -> SelectedWallet<W, M>
where
    W: WalletBackend,
    M: WalletBackend,
{
    match select_wallet_source(env) {
        WalletSource::Web => SelectedWallet::Web(web),
        WalletSource::Mobile => SelectedWallet::Mobile(mobile),
    }
}

impl<W, M> WalletBackend for SelectedWallet<W, M>
where
    W: WalletBackend + Send,
    M: WalletBackend + Send,
{
    async fn connect(&mut self) -> Result<()> {
        match self {
            Self::Web(wallet) => wallet.connect().await,
            Self::Mobile(wallet) => wallet.connect().await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Web(wallet) => wallet.disconnect().await,
            Self::Mobile(wallet) => wallet.disconnect().await,
        }
    }

    fn selected_account(&self) -> Option<String> {
        match self {
            Self::Web(wallet) => wallet.selected_account(),
            Self::Mobile(wallet) => wallet.selected_account(),
        }
    }

    fn connected(&self) -> bool {
        match self {
            Self::Web(wallet) => wallet.connected(),
            Self::Mobile(wallet) => wallet.connected(),
        }
    }

    fn connecting(&self) -> bool {
        match self {
            Self::Web(wallet) => wallet.connecting(),
            Self::Mobile(wallet) => wallet.connecting(),
        }
    }

    async fn sign_and_send(&mut self, transaction: &[u8]) -> Result<String> {
        match self {
            Self::Web(wallet) => wallet.sign_and_send(transaction).await,
            Self::Mobile(wallet) => wallet.sign_and_send(transaction).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(is_web: bool, is_wallet_browser: bool, is_native_app: bool) -> EnvironmentFacts {
        EnvironmentFacts {
            is_web,
            is_wallet_browser,
            is_native_app,
        }
    }

    #[test]
    fn test_web_context_selects_web_wallet() {
        assert_eq!(select_wallet_source(&env(true, false, false)), WalletSource::Web);
        assert_eq!(select_wallet_source(&env(true, true, true)), WalletSource::Web);
    }

    #[test]
    fn test_wallet_browser_selects_web_wallet() {
        assert_eq!(select_wallet_source(&env(false, true, false)), WalletSource::Web);
        assert_eq!(select_wallet_source(&env(false, true, true)), WalletSource::Web);
    }

    #[test]
    fn test_native_app_selects_mobile_wallet() {
        assert_eq!(
            select_wallet_source(&env(false, false, true)),
            WalletSource::Mobile
        );
    }

    #[test]
    fn test_mobile_is_the_default() {
        assert_eq!(
            select_wallet_source(&env(false, false, false)),
            WalletSource::Mobile
        );
    }

    /// Minimal in-memory backend; connect/disconnect just flip state.
    #[derive(Default)]
    struct FakeWallet {
        label: &'static str,
        connected: bool,
        sent: Vec<Vec<u8>>,
    }

    impl FakeWallet {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                ..Self::default()
            }
        }
    }

    impl WalletBackend for FakeWallet {
        async fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }

        fn selected_account(&self) -> Option<String> {
            self.connected.then(|| format!("{}-account", self.label))
        }

        fn connected(&self) -> bool {
            self.connected
        }

        fn connecting(&self) -> bool {
            false
        }

        async fn sign_and_send(&mut self, transaction: &[u8]) -> Result<String> {
            self.sent.push(transaction.to_vec());
            Ok(format!("sig-{}", self.sent.len()))
        }
    }

    #[tokio::test]
    async fn test_selected_wallet_delegates_to_chosen_backend() {
        let mut wallet = wallet_backend_for(
            &env(true, false, false),
            FakeWallet::new("web"),
            FakeWallet::new("mobile"),
        );
        assert_eq!(wallet.source(), WalletSource::Web);

        assert!(!wallet.connected());
        wallet.connect().await.expect("connect should succeed");
        assert!(wallet.connected());
        assert_eq!(wallet.selected_account().as_deref(), Some("web-account"));

        let signature = wallet
            .sign_and_send(b"serialized payment")
            .await
            .expect("sign_and_send should succeed");
        assert_eq!(signature, "sig-1");

        wallet.disconnect().await.expect("disconnect should succeed");
        assert!(!wallet.connected());
        assert!(wallet.selected_account().is_none());
    }

    #[tokio::test]
    async fn test_default_environment_selects_mobile_backend() {
        let wallet = wallet_backend_for(
            &EnvironmentFacts::default(),
            FakeWallet::new("web"),
            FakeWallet::new("mobile"),
        );
        assert_eq!(wallet.source(), WalletSource::Mobile);
    }
}
