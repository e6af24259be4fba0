//! Contract bindings for the token and bridge contracts the harness touches.

use ethers::contract::abigen;

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
        function decimals() external view returns (uint8)
        function symbol() external view returns (string)
    ]"#
);

abigen!(
    UnifiedBridge,
    r#"[
        function bridgeAsset(uint32 destinationNetwork, address destinationAddress, uint256 amount, address token, bool forceUpdateGlobalExitRoot, bytes permitData) external payable
        function isClaimed(uint32 leafIndex, uint32 sourceBridgeNetwork) external view returns (bool)
        function depositCount() external view returns (uint256)
    ]"#
);
